use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{bson_datetime_as_chrono_option, hex, user::UserSummary};

/// Student submission stored in MongoDB "assignments" collection. One per
/// (student, course, module); resubmission rewrites it in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub student: ObjectId,
    pub course: ObjectId,
    pub module: ObjectId,
    #[serde(default)]
    pub submission: String,
    #[serde(default)]
    pub submission_type: SubmissionType,
    #[serde(default)]
    pub submitted: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resubmitted: bool,
    #[serde(default)]
    pub graded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub graded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graded_by: Option<ObjectId>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionType {
    #[default]
    Text,
    Link,
}

impl SubmissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionType::Text => "text",
            SubmissionType::Link => "link",
        }
    }
}

/// Review state filter for the admin queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStatus {
    Pending,
    Graded,
    All,
}

impl ReviewStatus {
    /// Unknown values fall back to `pending`
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("graded") => ReviewStatus::Graded,
            Some("all") => ReviewStatus::All,
            _ => ReviewStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentView {
    pub id: String,
    pub student: String,
    pub course: String,
    pub module: String,
    pub submission: String,
    pub submission_type: SubmissionType,
    pub submitted: bool,
    pub submitted_at: Option<DateTime<Utc>>,
    pub resubmitted: bool,
    pub graded: bool,
    pub grade: Option<f64>,
    pub feedback: Option<String>,
    pub graded_at: Option<DateTime<Utc>>,
    pub graded_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_details: Option<UserSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_title: Option<String>,
}

impl From<Assignment> for AssignmentView {
    fn from(a: Assignment) -> Self {
        AssignmentView {
            id: hex(&a.id),
            student: a.student.to_hex(),
            course: a.course.to_hex(),
            module: a.module.to_hex(),
            submission: a.submission,
            submission_type: a.submission_type,
            submitted: a.submitted,
            submitted_at: a.submitted_at,
            resubmitted: a.resubmitted,
            graded: a.graded,
            grade: a.grade,
            feedback: a.feedback,
            graded_at: a.graded_at,
            graded_by: a.graded_by.map(|id| id.to_hex()),
            student_details: None,
            course_title: None,
            module_title: None,
        }
    }
}

impl AssignmentView {
    pub fn with_context(
        mut self,
        student: Option<UserSummary>,
        course_title: Option<String>,
        module_title: Option<String>,
    ) -> Self {
        self.student_details = student;
        self.course_title = course_title;
        self.module_title = module_title;
        self
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAssignmentRequest {
    #[validate(length(min = 1, message = "Course id is required"))]
    pub course_id: String,

    #[validate(length(min = 1, message = "Module id is required"))]
    pub module_id: String,

    #[validate(length(min = 1, max = 10000, message = "Submission is required"))]
    pub submission: String,

    #[serde(default)]
    pub submission_type: SubmissionType,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewAssignmentRequest {
    #[validate(range(min = 0.0, max = 100.0, message = "Grade must be between 0 and 100"))]
    pub grade: f64,

    #[validate(length(max = 1000, message = "Feedback must be at most 1000 characters"))]
    pub feedback: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAssignmentsQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub course_id: Option<String>,
    pub student_id: Option<String>,
    pub status: Option<String>,
}

/// `{id, title}` pair used for filter drop-downs
#[derive(Debug, Serialize)]
pub struct CourseOption {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct AssignmentQueue {
    pub assignments: Vec<AssignmentView>,
    pub courses: Vec<CourseOption>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_grade_bounds() {
        let ok = ReviewAssignmentRequest {
            grade: 0.0,
            feedback: None,
        };
        assert!(ok.validate().is_ok());

        let too_high = ReviewAssignmentRequest {
            grade: 100.5,
            feedback: None,
        };
        assert!(too_high.validate().is_err());

        let long_feedback = ReviewAssignmentRequest {
            grade: 90.0,
            feedback: Some("x".repeat(1001)),
        };
        assert!(long_feedback.validate().is_err());
    }

    #[test]
    fn test_submission_type_defaults_to_text() {
        let req: SubmitAssignmentRequest = serde_json::from_value(serde_json::json!({
            "courseId": "c",
            "moduleId": "m",
            "submission": "my answer"
        }))
        .unwrap();
        assert_eq!(req.submission_type, SubmissionType::Text);

        let bad = serde_json::from_value::<SubmitAssignmentRequest>(serde_json::json!({
            "courseId": "c",
            "moduleId": "m",
            "submission": "x",
            "submissionType": "file"
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn test_review_status_parse() {
        assert_eq!(ReviewStatus::parse(None), ReviewStatus::Pending);
        assert_eq!(ReviewStatus::parse(Some("graded")), ReviewStatus::Graded);
        assert_eq!(ReviewStatus::parse(Some("all")), ReviewStatus::All);
    }
}
