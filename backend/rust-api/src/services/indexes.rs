use anyhow::Context;
use mongodb::bson::{doc, Document};
use mongodb::options::IndexOptions;
use mongodb::{Database, IndexModel};

use crate::models::{ASSIGNMENTS, ENROLLMENTS, LESSONS, MODULES, QUIZ_ATTEMPTS, USERS};

fn index(keys: Document, unique: bool) -> IndexModel {
    let options = unique.then(|| IndexOptions::builder().unique(true).build());
    IndexModel::builder().keys(keys).options(options).build()
}

/// Indexes the application relies on, grouped by collection. Unique ones back
/// the duplicate checks on enrollments, attempts, submissions and emails.
pub fn required_indexes() -> Vec<(&'static str, IndexModel)> {
    vec![
        (USERS, index(doc! { "email": 1 }, true)),
        (ENROLLMENTS, index(doc! { "student": 1, "course": 1 }, true)),
        (ENROLLMENTS, index(doc! { "course": 1, "batch": 1 }, false)),
        (
            QUIZ_ATTEMPTS,
            index(doc! { "student": 1, "quiz": 1, "attemptNumber": 1 }, true),
        ),
        (QUIZ_ATTEMPTS, index(doc! { "student": 1, "course": 1 }, false)),
        (
            ASSIGNMENTS,
            index(doc! { "student": 1, "course": 1, "module": 1 }, true),
        ),
        (MODULES, index(doc! { "course": 1, "order": 1 }, false)),
        (LESSONS, index(doc! { "module": 1, "order": 1 }, false)),
    ]
}

pub async fn ensure_indexes(db: &Database) -> anyhow::Result<()> {
    for (collection, model) in required_indexes() {
        db.collection::<Document>(collection)
            .create_index(model)
            .await
            .with_context(|| format!("Failed to create index on {}", collection))?;
    }
    tracing::info!("MongoDB indexes ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_indexes() {
        let unique: Vec<(&str, Document)> = required_indexes()
            .into_iter()
            .filter(|(_, m)| m.options.as_ref().and_then(|o| o.unique) == Some(true))
            .map(|(c, m)| (c, m.keys))
            .collect();

        assert!(unique.contains(&(USERS, doc! { "email": 1 })));
        assert!(unique.contains(&(ENROLLMENTS, doc! { "student": 1, "course": 1 })));
        assert!(unique.contains(&(
            QUIZ_ATTEMPTS,
            doc! { "student": 1, "quiz": 1, "attemptNumber": 1 }
        )));
        assert_eq!(unique.len(), 4);
    }
}
