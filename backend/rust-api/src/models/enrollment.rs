use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::{
    assignment::AssignmentView,
    bson_datetime_as_chrono, bson_datetime_as_chrono_option,
    course::{CourseBrief, CourseDetail},
    hex,
    lesson::{LessonLink, LessonView},
    module::ModuleWithProgress,
    quiz::AttemptView,
    user::UserSummary,
};

/// Enrollment stored in MongoDB "enrollments" collection. Unique per
/// (student, course).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub student: ObjectId,
    pub course: ObjectId,
    #[serde(default)]
    pub batch: String,
    #[serde(default)]
    pub progress: u32,
    #[serde(default)]
    pub completed_lessons: Vec<ObjectId>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub enrolled_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub last_accessed: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    pub fn has_completed(&self, lesson_id: &ObjectId) -> bool {
        self.completed_lessons.contains(lesson_id)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentView {
    pub id: String,
    pub student: String,
    pub course: String,
    pub batch: String,
    pub progress: u32,
    pub completed_lessons: Vec<String>,
    pub enrolled_at: DateTime<Utc>,
    pub last_accessed: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_details: Option<CourseBrief>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_details: Option<UserSummary>,
}

impl From<Enrollment> for EnrollmentView {
    fn from(enrollment: Enrollment) -> Self {
        EnrollmentView {
            id: hex(&enrollment.id),
            student: enrollment.student.to_hex(),
            course: enrollment.course.to_hex(),
            batch: enrollment.batch,
            progress: enrollment.progress,
            completed_lessons: enrollment
                .completed_lessons
                .iter()
                .map(|id| id.to_hex())
                .collect(),
            enrolled_at: enrollment.enrolled_at,
            last_accessed: enrollment.last_accessed,
            completed_at: enrollment.completed_at,
            course_details: None,
            student_details: None,
        }
    }
}

impl EnrollmentView {
    pub fn with_course(mut self, course: Option<CourseBrief>) -> Self {
        self.course_details = course;
        self
    }

    pub fn with_student(mut self, student: Option<UserSummary>) -> Self {
        self.student_details = student;
        self
    }
}

/// `?status=` filter on the student's course list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Completed,
    InProgress,
    NotStarted,
}

impl ProgressStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "completed" => Some(ProgressStatus::Completed),
            "in-progress" => Some(ProgressStatus::InProgress),
            "not-started" => Some(ProgressStatus::NotStarted),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StudentCoursesQuery {
    pub status: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub enrollment: EnrollmentView,
    pub progress: u32,
    pub completed_lessons: usize,
    pub total_lessons: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleProgress {
    pub module_id: String,
    pub module_title: String,
    pub completed_lessons: usize,
    pub total_lessons: usize,
    pub progress: u32,
}

/// A module assignment the student still has to hand in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingAssignment {
    pub course_id: String,
    pub course_title: String,
    pub module_id: String,
    pub module_title: String,
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProgress {
    pub overall_progress: u32,
    pub module_progress: Vec<ModuleProgress>,
    pub completed_lessons: usize,
    pub total_lessons: usize,
    pub assignments: Vec<UpcomingAssignment>,
    pub quiz_attempts: Vec<AttemptView>,
    pub enrolled_at: DateTime<Utc>,
    pub last_accessed: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_courses: u64,
    pub completed_courses: u64,
    pub in_progress_courses: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    pub course_id: String,
    pub course_title: String,
    pub progress: u32,
    pub enrolled_at: DateTime<Utc>,
    pub last_accessed: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDashboard {
    pub enrollments: Vec<EnrollmentView>,
    pub stats: DashboardStats,
    pub assignments: Vec<UpcomingAssignment>,
    pub recent_activity: Vec<RecentActivity>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentCourseDetail {
    pub course: CourseDetail<ModuleWithProgress>,
    pub enrollment: EnrollmentView,
    pub assignments: Vec<AssignmentView>,
    pub quiz_attempts: Vec<AttemptView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonDetail {
    pub lesson: LessonView,
    pub previous_lesson: Option<LessonLink>,
    pub next_lesson: Option<LessonLink>,
    pub is_completed: bool,
    /// Title of the module the lesson belongs to
    pub module: String,
}
