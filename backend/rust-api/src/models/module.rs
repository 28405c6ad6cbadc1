use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{bson_datetime_as_chrono_option, hex, lesson::LessonView};

/// Course module stored in MongoDB "modules" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseModule {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub course: ObjectId,
    pub order: i32,
    /// Lesson ids in display order
    #[serde(default)]
    pub lessons: Vec<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment: Option<ModuleAssignment>,
}

/// Assignment brief attached to a module. Submissions live in "assignments".
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ModuleAssignment {
    #[validate(length(min = 1, max = 200, message = "Assignment title is required"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizBrief {
    pub id: String,
    pub title: String,
    pub time_limit: u32,
    pub question_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub course: String,
    pub order: i32,
    pub lessons: Vec<LessonView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz: Option<QuizBrief>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<AssignmentBrief>,
}

/// Module assignment as rendered to clients; `due_date` is kept as-is.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentBrief {
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
}

impl From<ModuleAssignment> for AssignmentBrief {
    fn from(a: ModuleAssignment) -> Self {
        AssignmentBrief {
            title: a.title,
            description: a.description,
            due_date: a.due_date,
        }
    }
}

impl ModuleView {
    pub fn new(module: CourseModule, lessons: Vec<LessonView>, quiz: Option<QuizBrief>) -> Self {
        ModuleView {
            id: hex(&module.id),
            title: module.title,
            description: module.description,
            course: module.course.to_hex(),
            order: module.order,
            lessons,
            quiz,
            assignment: module.assignment.map(Into::into),
        }
    }
}

/// Module entry in an enrolled student's course view
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleWithProgress {
    #[serde(flatten)]
    pub module: ModuleView,
    pub progress: u32,
    pub completed_lessons: usize,
    pub total_lessons: usize,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateModuleRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Appended after the last module when omitted
    pub order: Option<i32>,

    #[validate(nested)]
    pub assignment: Option<ModuleAssignment>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateModuleRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: Option<String>,

    pub description: Option<String>,

    pub order: Option<i32>,

    #[validate(nested)]
    pub assignment: Option<ModuleAssignment>,
}
