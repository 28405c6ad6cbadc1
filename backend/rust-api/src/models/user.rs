use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

use super::{bson_datetime_as_chrono, hex};

/// User model stored in MongoDB "users" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub email: String,
    /// bcrypt hash
    #[serde(rename = "password")]
    pub password_hash: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub enrolled_courses: Vec<EnrolledCourse>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

/// Denormalised copy of an enrollment kept on the user document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledCourse {
    pub course: ObjectId,
    #[serde(default)]
    pub progress: u32,
    #[serde(default)]
    pub completed_lessons: Vec<ObjectId>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub enrollment_date: DateTime<Utc>,
    #[serde(default)]
    pub batch: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Student,
    Instructor,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Instructor => "instructor",
            UserRole::Admin => "admin",
        }
    }

    /// Instructors and admins manage the catalog.
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Instructor | UserRole::Admin)
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "student" => Ok(UserRole::Student),
            "instructor" => Ok(UserRole::Instructor),
            "admin" => Ok(UserRole::Admin),
            _ => Err(format!("Invalid role: {}", value)),
        }
    }
}

/// User profile returned to client (without password hash)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub avatar: String,
    pub bio: String,
    pub phone: String,
    pub enrolled_courses: Vec<EnrolledCourseView>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledCourseView {
    pub course: String,
    pub progress: u32,
    pub completed_lessons: Vec<String>,
    pub enrollment_date: DateTime<Utc>,
    pub batch: String,
}

impl From<EnrolledCourse> for EnrolledCourseView {
    fn from(entry: EnrolledCourse) -> Self {
        EnrolledCourseView {
            course: entry.course.to_hex(),
            progress: entry.progress,
            completed_lessons: entry.completed_lessons.iter().map(|id| id.to_hex()).collect(),
            enrollment_date: entry.enrollment_date,
            batch: entry.batch,
        }
    }
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        UserProfile {
            id: hex(&user.id),
            name: user.name,
            email: user.email,
            role: user.role,
            avatar: user.avatar,
            bio: user.bio,
            phone: user.phone,
            enrolled_courses: user.enrolled_courses.into_iter().map(Into::into).collect(),
            created_at: user.created_at,
        }
    }
}

/// Compact user reference used when another document "populates" a user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub avatar: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bio: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        UserSummary {
            id: hex(&user.id),
            name: user.name.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone(),
            bio: user.bio.clone(),
        }
    }
}

/// Request to register a new user
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50, message = "Name must be between 3 and 50 characters"))]
    pub name: String,

    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    /// Defaults to student. Admin requires `registration_key`.
    pub role: Option<UserRole>,

    pub registration_key: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Response after successful login or registration
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 3, max = 50, message = "Name must be between 3 and 50 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 500, message = "Avatar URL is too long"))]
    pub avatar: Option<String>,

    #[validate(length(max = 500, message = "Bio must be at most 500 characters"))]
    pub bio: Option<String>,

    #[validate(length(max = 20, message = "Phone must be at most 20 characters"))]
    pub phone: Option<String>,
}

/// Admin-side edit of a student
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStudentRequest {
    #[validate(length(min = 3, max = 50, message = "Name must be between 3 and 50 characters"))]
    pub name: Option<String>,

    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStudentsQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Admin list entry: profile plus enrollment counters
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentWithStats {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub total_enrollments: u64,
    pub completed_courses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: None,
            registration_key: None,
        }
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("instructor".parse::<UserRole>().unwrap(), UserRole::Instructor);
        assert!("teacher".parse::<UserRole>().is_err());
        assert!(UserRole::Admin.is_staff());
        assert!(UserRole::Instructor.is_staff());
        assert!(!UserRole::Student.is_staff());
    }

    #[test]
    fn test_register_validation() {
        assert!(register("Alice", "alice@example.com", "secret1").validate().is_ok());
        assert!(register("Al", "alice@example.com", "secret1").validate().is_err());
        assert!(register("Alice", "not-an-email", "secret1").validate().is_err());
        assert!(register("Alice", "alice@example.com", "12345").validate().is_err());
    }

    #[test]
    fn test_register_request_reads_camel_case_key() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "name": "Root",
            "email": "root@example.com",
            "password": "secret1",
            "role": "admin",
            "registrationKey": "k"
        }))
        .unwrap();
        assert_eq!(req.role, Some(UserRole::Admin));
        assert_eq!(req.registration_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_profile_hides_password() {
        let user = User {
            id: Some(ObjectId::new()),
            name: "Alice".into(),
            email: "alice@example.com".into(),
            password_hash: "$2b$secret".into(),
            role: UserRole::Student,
            avatar: String::new(),
            bio: String::new(),
            phone: String::new(),
            enrolled_courses: vec![],
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(UserProfile::from(user)).unwrap();
        assert!(value.get("password").is_none());
        assert!(value.get("passwordHash").is_none());
        assert_eq!(value["role"], "student");
    }
}
