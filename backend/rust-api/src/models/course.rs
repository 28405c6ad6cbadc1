use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{
    bson_datetime_as_chrono, bson_datetime_as_chrono_option, hex, module::ModuleView,
    user::UserSummary,
};

pub const DEFAULT_BATCH: &str = "Default Batch";

/// Course model stored in MongoDB "courses" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    pub description: String,
    pub instructor: ObjectId,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub price: f64,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub syllabus: Vec<SyllabusEntry>,
    /// Module ids in display order
    #[serde(default)]
    pub modules: Vec<ObjectId>,
    #[serde(default)]
    pub batches: Vec<Batch>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub total_students: i64,
    #[serde(default)]
    pub is_published: bool,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

impl Course {
    pub fn is_owned_by(&self, user_id: &ObjectId) -> bool {
        &self.instructor == user_id
    }

    pub fn batch(&self, name: &str) -> Option<&Batch> {
        self.batches.iter().find(|b| b.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SyllabusEntry {
    #[validate(range(min = 1, message = "Syllabus week must be at least 1"))]
    pub week: u32,
    #[validate(length(min = 1, message = "Syllabus topic is required"))]
    pub topic: String,
    #[serde(default)]
    pub description: String,
}

/// A cohort of a course. `max_students == 0` means unlimited.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_students: u32,
}

impl Batch {
    pub fn is_full(&self, enrolled: u64) -> bool {
        self.max_students > 0 && enrolled >= u64::from(self.max_students)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchView {
    pub id: String,
    pub name: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub max_students: u32,
}

impl From<&Batch> for BatchView {
    fn from(batch: &Batch) -> Self {
        BatchView {
            id: batch.id.to_hex(),
            name: batch.name.clone(),
            start_date: batch.start_date,
            end_date: batch.end_date,
            max_students: batch.max_students,
        }
    }
}

/// Course as returned by the API. `instructor` is populated when the caller
/// loaded the user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub instructor_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor: Option<UserSummary>,
    pub category: String,
    pub tags: Vec<String>,
    pub price: f64,
    pub thumbnail: String,
    pub syllabus: Vec<SyllabusEntry>,
    /// Module ids; left empty when the modules are embedded (see [`CourseDetail`])
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<String>,
    pub batches: Vec<BatchView>,
    pub rating: f64,
    pub total_students: i64,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

impl CourseView {
    pub fn new(course: Course, instructor: Option<UserSummary>) -> Self {
        CourseView {
            id: hex(&course.id),
            title: course.title,
            description: course.description,
            instructor_id: course.instructor.to_hex(),
            instructor,
            category: course.category,
            tags: course.tags,
            price: course.price,
            thumbnail: course.thumbnail,
            syllabus: course.syllabus,
            modules: course.modules.iter().map(|id| id.to_hex()).collect(),
            batches: course.batches.iter().map(BatchView::from).collect(),
            rating: course.rating,
            total_students: course.total_students,
            is_published: course.is_published,
            created_at: course.created_at,
        }
    }
}

impl From<Course> for CourseView {
    fn from(course: Course) -> Self {
        CourseView::new(course, None)
    }
}

/// Small projection used inside enrollments and dashboards.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseBrief {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
    pub category: String,
    pub price: f64,
    pub rating: f64,
    pub total_students: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor_name: Option<String>,
}

impl CourseBrief {
    pub fn new(course: &Course, instructor_name: Option<String>) -> Self {
        CourseBrief {
            id: hex(&course.id),
            title: course.title.clone(),
            thumbnail: course.thumbnail.clone(),
            category: course.category.clone(),
            price: course.price,
            rating: course.rating,
            total_students: course.total_students,
            instructor_name,
        }
    }
}

/// Course with its modules and lessons populated.
#[derive(Debug, Serialize)]
pub struct CourseDetail<M: Serialize = ModuleView> {
    #[serde(flatten)]
    pub course: CourseView,
    #[serde(rename = "modules")]
    pub module_details: Vec<M>,
}

impl<M: Serialize> CourseDetail<M> {
    pub fn new(mut course: CourseView, module_details: Vec<M>) -> Self {
        course.modules.clear();
        CourseDetail {
            course,
            module_details,
        }
    }
}

/// Admin list entry
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseWithStats {
    #[serde(flatten)]
    pub course: CourseView,
    pub total_enrollments: u64,
    pub pending_assignments: u64,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseRequest {
    #[validate(length(min = 5, max = 200, message = "Title must be between 5 and 200 characters"))]
    pub title: String,

    #[validate(length(min = 10, message = "Description must be at least 10 characters"))]
    pub description: String,

    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[validate(range(min = 0.0, message = "Price must be a non-negative number"))]
    pub price: f64,

    #[validate(url(message = "Thumbnail must be a valid URL"))]
    pub thumbnail: Option<String>,

    #[serde(default)]
    #[validate(nested)]
    pub syllabus: Vec<SyllabusEntry>,

    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCourseRequest {
    #[validate(length(min = 5, max = 200, message = "Title must be between 5 and 200 characters"))]
    pub title: Option<String>,

    #[validate(length(min = 10, message = "Description must be at least 10 characters"))]
    pub description: Option<String>,

    #[validate(length(min = 1, message = "Category is required"))]
    pub category: Option<String>,

    pub tags: Option<Vec<String>>,

    #[validate(range(min = 0.0, message = "Price must be a non-negative number"))]
    pub price: Option<f64>,

    #[validate(url(message = "Thumbnail must be a valid URL"))]
    pub thumbnail: Option<String>,

    #[validate(nested)]
    pub syllabus: Option<Vec<SyllabusEntry>>,

    pub is_published: Option<bool>,
}

/// Public catalog query
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCoursesQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Admin course query
#[derive(Debug, Default, Deserialize)]
pub struct AdminCoursesQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EnrollRequest {
    pub batch: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchRequest {
    #[validate(length(min = 1, max = 100, message = "Batch name is required"))]
    pub name: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub max_students: Option<u32>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBatchRequest {
    #[validate(length(min = 1, max = 100, message = "Batch name is required"))]
    pub name: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub max_students: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(max_students: u32) -> Batch {
        Batch {
            id: ObjectId::new(),
            name: "Spring".to_string(),
            start_date: None,
            end_date: None,
            max_students,
        }
    }

    #[test]
    fn test_batch_capacity() {
        assert!(!batch(0).is_full(1_000));
        assert!(!batch(2).is_full(1));
        assert!(batch(2).is_full(2));
    }

    #[test]
    fn test_create_course_validation() {
        let req: CreateCourseRequest = serde_json::from_value(serde_json::json!({
            "title": "Rust",
            "description": "A long enough description",
            "category": "programming",
            "price": 10.0
        }))
        .unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("title"));

        let req: CreateCourseRequest = serde_json::from_value(serde_json::json!({
            "title": "Rust for everyone",
            "description": "A long enough description",
            "category": "programming",
            "price": -1.0,
            "syllabus": [{ "week": 1, "topic": "Ownership" }]
        }))
        .unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("price"));
    }

    #[test]
    fn test_course_view_uses_hex_ids() {
        let course = Course {
            id: Some(ObjectId::new()),
            title: "Rust for everyone".into(),
            description: "desc".into(),
            instructor: ObjectId::new(),
            category: "programming".into(),
            tags: vec![],
            price: 0.0,
            thumbnail: String::new(),
            syllabus: vec![],
            modules: vec![ObjectId::new()],
            batches: vec![batch(10)],
            rating: 0.0,
            total_students: 0,
            is_published: true,
            created_at: Utc::now(),
        };
        let owner = course.instructor;
        assert!(course.is_owned_by(&owner));
        assert!(course.batch("Spring").is_some());

        let value = serde_json::to_value(CourseView::from(course)).unwrap();
        assert_eq!(value["instructorId"], owner.to_hex());
        assert!(value["modules"][0].is_string());
        assert_eq!(value["batches"][0]["maxStudents"], 10);
        assert!(value.get("instructor").is_none());
    }
}
