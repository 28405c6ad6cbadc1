use futures::TryStreamExt;
use mongodb::{
    bson::{oid::ObjectId, Bson, Document, Regex},
    error::{ErrorKind, WriteFailure},
    Cursor,
};
use serde::de::DeserializeOwned;

use crate::error::{AppError, AppResult};

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Parse a path/body identifier, reporting `Invalid <what> id` on malformed input
pub fn parse_object_id(value: &str, what: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(value.trim())
        .map_err(|_| AppError::bad_request(format!("Invalid {} id", what)))
}

/// Case-insensitive "contains" regex. User input is escaped so that search terms
/// match literally.
pub fn search_regex(term: &str) -> Regex {
    Regex {
        pattern: regex::escape(term.trim()),
        options: "i".to_string(),
    }
}

/// True for unique-index violations (E11000), whether raised by a plain write or
/// by a findAndModify command.
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref we)) => we.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(ref ce) => ce.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

pub async fn collect<T>(cursor: Cursor<T>, what: &str) -> AppResult<Vec<T>>
where
    T: DeserializeOwned + Send + Sync + Unpin,
{
    cursor
        .try_collect()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to read {}: {}", what, e)))
}

/// Numeric field of an aggregation result, whatever width the server chose.
pub fn number(doc: &Document, key: &str) -> f64 {
    match doc.get(key) {
        Some(Bson::Double(v)) => *v,
        Some(Bson::Int32(v)) => f64::from(*v),
        Some(Bson::Int64(v)) => *v as f64,
        _ => 0.0,
    }
}

pub fn count(doc: &Document, key: &str) -> u64 {
    number(doc, key).max(0.0) as u64
}

pub fn hex_ids(ids: &[ObjectId]) -> Vec<String> {
    ids.iter().map(|id| id.to_hex()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_id() {
        let id = ObjectId::new();
        assert_eq!(parse_object_id(&id.to_hex(), "course").unwrap(), id);

        let err = parse_object_id("not-an-id", "course").unwrap_err();
        assert_eq!(err.to_string(), "Invalid course id");
    }

    #[test]
    fn test_number_reads_any_width() {
        use mongodb::bson::doc;
        let d = doc! { "a": 3_i32, "b": 4_i64, "c": 2.5, "d": "x" };
        assert_eq!(number(&d, "a"), 3.0);
        assert_eq!(count(&d, "b"), 4);
        assert_eq!(number(&d, "c"), 2.5);
        assert_eq!(number(&d, "d"), 0.0);
        assert_eq!(count(&d, "missing"), 0);
    }

    #[test]
    fn test_search_regex_escapes_input() {
        let regex = search_regex(" c++ (basics) ");
        assert_eq!(regex.pattern, r"c\+\+ \(basics\)");
        assert_eq!(regex.options, "i");
    }
}
