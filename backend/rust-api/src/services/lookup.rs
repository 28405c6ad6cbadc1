//! Batch loaders that stand in for "populate": each takes a set of ids and
//! returns a map keyed by id, issuing a single `$in` query.

use std::collections::HashMap;

use anyhow::Context;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::Database;

use crate::error::AppResult;
use crate::models::{course::Course, user::User, COURSES, MODULES, QUIZZES, USERS};
use crate::utils::mongo::collect;

fn dedup(ids: impl IntoIterator<Item = ObjectId>) -> Vec<ObjectId> {
    let mut ids: Vec<ObjectId> = ids.into_iter().collect();
    ids.sort();
    ids.dedup();
    ids
}

pub async fn users_by_id(
    mongo: &Database,
    ids: impl IntoIterator<Item = ObjectId>,
) -> AppResult<HashMap<ObjectId, User>> {
    let ids = dedup(ids);
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let cursor = mongo
        .collection::<User>(USERS)
        .find(doc! { "_id": { "$in": ids } })
        .await
        .context("Failed to query users")?;
    let users = collect(cursor, "users").await?;
    Ok(users
        .into_iter()
        .filter_map(|user| user.id.map(|id| (id, user)))
        .collect())
}

pub async fn courses_by_id(
    mongo: &Database,
    ids: impl IntoIterator<Item = ObjectId>,
) -> AppResult<HashMap<ObjectId, Course>> {
    let ids = dedup(ids);
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let cursor = mongo
        .collection::<Course>(COURSES)
        .find(doc! { "_id": { "$in": ids } })
        .await
        .context("Failed to query courses")?;
    let courses = collect(cursor, "courses").await?;
    Ok(courses
        .into_iter()
        .filter_map(|course| course.id.map(|id| (id, course)))
        .collect())
}

/// `_id -> title` for any collection whose documents carry a `title`
async fn titles(
    mongo: &Database,
    collection: &str,
    ids: impl IntoIterator<Item = ObjectId>,
) -> AppResult<HashMap<ObjectId, String>> {
    let ids = dedup(ids);
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let cursor = mongo
        .collection::<Document>(collection)
        .find(doc! { "_id": { "$in": ids } })
        .projection(doc! { "title": 1 })
        .await
        .with_context(|| format!("Failed to query {} titles", collection))?;
    let docs = collect(cursor, collection).await?;
    Ok(docs
        .into_iter()
        .filter_map(|doc| {
            let id = doc.get_object_id("_id").ok()?;
            let title = doc.get_str("title").unwrap_or_default().to_string();
            Some((id, title))
        })
        .collect())
}

pub async fn course_titles(
    mongo: &Database,
    ids: impl IntoIterator<Item = ObjectId>,
) -> AppResult<HashMap<ObjectId, String>> {
    titles(mongo, COURSES, ids).await
}

pub async fn module_titles(
    mongo: &Database,
    ids: impl IntoIterator<Item = ObjectId>,
) -> AppResult<HashMap<ObjectId, String>> {
    titles(mongo, MODULES, ids).await
}

pub async fn quiz_titles(
    mongo: &Database,
    ids: impl IntoIterator<Item = ObjectId>,
) -> AppResult<HashMap<ObjectId, String>> {
    titles(mongo, QUIZZES, ids).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_ids() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let ids = dedup(vec![b, a, b, a]);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a) && ids.contains(&b));
    }
}
