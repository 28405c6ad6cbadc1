pub mod analytics;
pub mod api;
pub mod assignment;
pub mod course;
pub mod enrollment;
pub mod lesson;
pub mod module;
pub mod quiz;
pub mod upload;
pub mod user;

use mongodb::bson::oid::ObjectId;

// Collection names
pub const USERS: &str = "users";
pub const COURSES: &str = "courses";
pub const MODULES: &str = "modules";
pub const LESSONS: &str = "lessons";
pub const QUIZZES: &str = "quizzes";
pub const QUIZ_ATTEMPTS: &str = "quiz_attempts";
pub const ENROLLMENTS: &str = "enrollments";
pub const ASSIGNMENTS: &str = "assignments";

pub(crate) fn hex(id: &Option<ObjectId>) -> String {
    id.map(|id| id.to_hex()).unwrap_or_default()
}

// Serde converters for chrono::DateTime <-> mongodb::bson::DateTime
pub(crate) mod bson_datetime_as_chrono {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let bson_dt = bson::DateTime::from_millis(date.timestamp_millis());
        bson_dt.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bson_dt = bson::DateTime::deserialize(deserializer)?;
        DateTime::from_timestamp_millis(bson_dt.timestamp_millis())
            .ok_or_else(|| D::Error::custom("datetime out of range"))
    }
}

pub(crate) mod bson_datetime_as_chrono_option {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => {
                let bson_dt = bson::DateTime::from_millis(d.timestamp_millis());
                serializer.serialize_some(&bson_dt)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt_bson_dt: Option<bson::DateTime> = Option::deserialize(deserializer)?;
        opt_bson_dt
            .map(|bson_dt| {
                DateTime::from_timestamp_millis(bson_dt.timestamp_millis())
                    .ok_or_else(|| D::Error::custom("datetime out of range"))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use mongodb::bson::{self, doc};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Stamped {
        #[serde(with = "bson_datetime_as_chrono")]
        at: DateTime<Utc>,
        #[serde(default, with = "bson_datetime_as_chrono_option")]
        maybe: Option<DateTime<Utc>>,
    }

    #[test]
    fn test_datetime_helpers_store_bson_dates() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        let value = Stamped { at, maybe: None };

        let document = bson::to_document(&value).unwrap();
        assert!(matches!(document.get("at"), Some(bson::Bson::DateTime(_))));

        let back: Stamped = bson::from_document(document).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_optional_datetime_missing_field() {
        let at = bson::DateTime::from_millis(1_700_000_000_000);
        let back: Stamped = bson::from_document(doc! { "at": at }).unwrap();
        assert!(back.maybe.is_none());
    }

    #[test]
    fn test_hex() {
        let id = ObjectId::new();
        assert_eq!(hex(&Some(id)), id.to_hex());
        assert_eq!(hex(&None), "");
    }
}
