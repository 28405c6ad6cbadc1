use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::hex;

/// Lesson model stored in MongoDB "lessons" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub module: ObjectId,
    #[serde(default)]
    pub video_url: String,
    /// Minutes
    #[serde(default)]
    pub duration: u32,
    pub order: i32,
    #[serde(default)]
    pub is_preview: bool,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Resource {
    #[validate(length(min = 1, message = "Resource title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Resource url is required"))]
    pub url: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub module: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    pub duration: u32,
    pub order: i32,
    pub is_preview: bool,
    pub resources: Vec<Resource>,
}

impl LessonView {
    /// Full view for staff and enrolled students.
    pub fn full(lesson: Lesson) -> Self {
        let video_url = Some(lesson.video_url.clone());
        Self::build(lesson, video_url)
    }

    /// Catalog view: the video is only exposed for preview lessons.
    pub fn public(lesson: Lesson) -> Self {
        let video_url = lesson.is_preview.then(|| lesson.video_url.clone());
        Self::build(lesson, video_url)
    }

    fn build(lesson: Lesson, video_url: Option<String>) -> Self {
        LessonView {
            id: hex(&lesson.id),
            title: lesson.title,
            description: lesson.description,
            module: lesson.module.to_hex(),
            video_url,
            duration: lesson.duration,
            order: lesson.order,
            is_preview: lesson.is_preview,
            resources: lesson.resources,
        }
    }
}

/// Previous/next navigation entry
#[derive(Debug, Clone, Serialize)]
pub struct LessonLink {
    pub id: String,
    pub title: String,
    pub order: i32,
}

impl From<&Lesson> for LessonLink {
    fn from(lesson: &Lesson) -> Self {
        LessonLink {
            id: hex(&lesson.id),
            title: lesson.title.clone(),
            order: lesson.order,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLessonRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[validate(url(message = "Video URL must be a valid URL"))]
    pub video_url: Option<String>,

    #[serde(default)]
    pub duration: u32,

    /// Appended after the last lesson when omitted
    pub order: Option<i32>,

    #[serde(default)]
    pub is_preview: bool,

    #[serde(default)]
    #[validate(nested)]
    pub resources: Vec<Resource>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLessonRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: Option<String>,

    pub description: Option<String>,

    #[validate(url(message = "Video URL must be a valid URL"))]
    pub video_url: Option<String>,

    pub duration: Option<u32>,

    pub order: Option<i32>,

    pub is_preview: Option<bool>,

    #[validate(nested)]
    pub resources: Option<Vec<Resource>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(is_preview: bool) -> Lesson {
        Lesson {
            id: Some(ObjectId::new()),
            title: "Intro".into(),
            description: String::new(),
            module: ObjectId::new(),
            video_url: "https://cdn.example.com/intro.mp4".into(),
            duration: 12,
            order: 1,
            is_preview,
            resources: vec![],
        }
    }

    #[test]
    fn test_public_view_hides_non_preview_video() {
        assert!(LessonView::public(lesson(false)).video_url.is_none());
        assert!(LessonView::public(lesson(true)).video_url.is_some());
        assert!(LessonView::full(lesson(false)).video_url.is_some());
    }

    #[test]
    fn test_resource_type_field() {
        let resource: Resource = serde_json::from_value(serde_json::json!({
            "title": "Slides",
            "url": "https://example.com/slides.pdf",
            "type": "pdf"
        }))
        .unwrap();
        assert_eq!(resource.kind, "pdf");
    }
}
