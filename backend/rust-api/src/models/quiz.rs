use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{bson_datetime_as_chrono, bson_datetime_as_chrono_option, hex, user::UserSummary};
use crate::grading::{GradeSummary, QuestionResult};

pub const DEFAULT_PASSING_SCORE: f64 = 70.0;
/// Minutes
pub const DEFAULT_TIME_LIMIT: u32 = 30;

fn default_points() -> u32 {
    1
}

fn default_passing_score() -> f64 {
    DEFAULT_PASSING_SCORE
}

/// Quiz model stored in MongoDB "quizzes" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    pub module: ObjectId,
    pub questions: Vec<Question>,
    /// Always `grading::total_points(&questions)`
    #[serde(default)]
    pub total_points: u32,
    #[serde(default = "default_passing_score")]
    pub passing_score: f64,
    #[serde(default)]
    pub time_limit: u32,
    #[serde(default)]
    pub allow_retake: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_answer_index"))]
pub struct Question {
    #[validate(length(min = 1, message = "Question text is required"))]
    pub question: String,
    #[validate(length(min = 2, message = "Each question needs at least 2 options"))]
    pub options: Vec<String>,
    #[validate(range(min = 0, message = "Correct answer must be a valid option index"))]
    pub correct_answer: i32,
    #[serde(default = "default_points")]
    #[validate(range(min = 1, message = "Question points must be at least 1"))]
    pub points: u32,
}

fn validate_answer_index(question: &Question) -> Result<(), ValidationError> {
    let in_range = usize::try_from(question.correct_answer)
        .map(|idx| idx < question.options.len())
        .unwrap_or(false);
    if in_range {
        Ok(())
    } else {
        Err(ValidationError::new("correct_answer")
            .with_message("Correct answer must be a valid option index".into()))
    }
}

/// Question as shown to the client; the key is stripped for students.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub question: String,
    pub options: Vec<String>,
    pub points: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizView {
    pub id: String,
    pub title: String,
    pub module: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_title: Option<String>,
    pub questions: Vec<QuestionView>,
    pub total_points: u32,
    pub passing_score: f64,
    pub time_limit: u32,
    pub allow_retake: bool,
}

impl QuizView {
    pub fn new(quiz: Quiz, module_title: Option<String>, include_answers: bool) -> Self {
        QuizView {
            id: hex(&quiz.id),
            title: quiz.title,
            module: quiz.module.to_hex(),
            module_title,
            questions: quiz
                .questions
                .into_iter()
                .map(|q| QuestionView {
                    question: q.question,
                    options: q.options,
                    points: q.points,
                    correct_answer: include_answers.then_some(q.correct_answer),
                })
                .collect(),
            total_points: quiz.total_points,
            passing_score: quiz.passing_score,
            time_limit: quiz.time_limit,
            allow_retake: quiz.allow_retake,
        }
    }
}

/// One graded submission, stored in "quiz_attempts". Never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub student: ObjectId,
    pub quiz: ObjectId,
    pub course: ObjectId,
    pub module: ObjectId,
    pub answers: Vec<i32>,
    /// Percentage, two decimals
    pub score: f64,
    pub passed: bool,
    #[serde(default = "default_points")]
    pub attempt_number: u32,
    /// Seconds
    #[serde(default)]
    pub time_taken: u32,
    #[serde(with = "bson_datetime_as_chrono")]
    pub attempted_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptView {
    pub id: String,
    pub student: String,
    pub quiz: String,
    pub course: String,
    pub module: String,
    pub answers: Vec<i32>,
    pub score: f64,
    pub passed: bool,
    pub attempt_number: u32,
    pub time_taken: u32,
    pub attempted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_details: Option<UserSummary>,
}

impl From<QuizAttempt> for AttemptView {
    fn from(attempt: QuizAttempt) -> Self {
        AttemptView {
            id: hex(&attempt.id),
            student: attempt.student.to_hex(),
            quiz: attempt.quiz.to_hex(),
            course: attempt.course.to_hex(),
            module: attempt.module.to_hex(),
            answers: attempt.answers,
            score: attempt.score,
            passed: attempt.passed,
            attempt_number: attempt.attempt_number,
            time_taken: attempt.time_taken,
            attempted_at: attempt.attempted_at,
            completed_at: attempt.completed_at,
            quiz_title: None,
            module_title: None,
            student_details: None,
        }
    }
}

impl AttemptView {
    pub fn with_titles(mut self, quiz_title: Option<String>, module_title: Option<String>) -> Self {
        self.quiz_title = quiz_title;
        self.module_title = module_title;
        self
    }

    pub fn with_student(mut self, student: Option<UserSummary>) -> Self {
        self.student_details = student;
        self
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, message = "Module id is required"))]
    pub module_id: String,

    #[validate(length(min = 5, max = 200, message = "Title must be between 5 and 200 characters"))]
    pub title: String,

    #[validate(
        length(min = 1, message = "At least one question is required"),
        nested
    )]
    pub questions: Vec<Question>,

    #[validate(range(min = 0.0, max = 100.0, message = "Passing score must be between 0 and 100"))]
    pub passing_score: Option<f64>,

    #[validate(range(min = 1, max = 180, message = "Time limit must be between 1 and 180 minutes"))]
    pub time_limit: Option<u32>,

    #[serde(default)]
    pub allow_retake: bool,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuizRequest {
    #[validate(length(min = 5, max = 200, message = "Title must be between 5 and 200 characters"))]
    pub title: Option<String>,

    #[validate(
        length(min = 1, message = "At least one question is required"),
        nested
    )]
    pub questions: Option<Vec<Question>>,

    #[validate(range(min = 0.0, max = 100.0, message = "Passing score must be between 0 and 100"))]
    pub passing_score: Option<f64>,

    #[validate(range(min = 1, max = 180, message = "Time limit must be between 1 and 180 minutes"))]
    pub time_limit: Option<u32>,

    pub allow_retake: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitQuizRequest {
    pub answers: Vec<i32>,
    /// Seconds
    #[serde(default)]
    pub time_taken: u32,
}

#[derive(Debug, Serialize)]
pub struct SubmitQuizResponse {
    pub attempt: AttemptView,
    pub results: Vec<QuestionResult>,
    pub summary: GradeSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizHeader {
    pub id: String,
    pub title: String,
    pub passing_score: f64,
    pub time_limit: u32,
    pub total_points: u32,
}

impl From<&Quiz> for QuizHeader {
    fn from(quiz: &Quiz) -> Self {
        QuizHeader {
            id: hex(&quiz.id),
            title: quiz.title.clone(),
            passing_score: quiz.passing_score,
            time_limit: quiz.time_limit,
            total_points: quiz.total_points,
        }
    }
}

/// Latest attempt replayed against the current answer key
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedResult {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: i32,
    pub user_answer: Option<i32>,
    pub is_correct: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestAttempt {
    #[serde(flatten)]
    pub attempt: AttemptView,
    pub detailed_results: Vec<DetailedResult>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResults {
    pub quiz: QuizHeader,
    pub attempts: Vec<AttemptView>,
    pub latest_attempt: LatestAttempt,
}

/// Aggregate over a set of attempts; rates are percentages.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttemptStatistics {
    pub total_attempts: u64,
    pub total_passed: u64,
    pub average_score: f64,
    pub pass_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct StudentAttempts {
    pub attempts: Vec<AttemptView>,
    pub performance: AttemptStatistics,
}

#[derive(Debug, Serialize)]
pub struct CourseAttempts {
    pub attempts: Vec<AttemptView>,
    pub statistics: AttemptStatistics,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseAttemptsQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub student_id: Option<String>,
    pub module_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct: i32, options: usize) -> Question {
        Question {
            question: "2 + 2?".into(),
            options: (0..options).map(|i| i.to_string()).collect(),
            correct_answer: correct,
            points: 1,
        }
    }

    #[test]
    fn test_points_default_to_one() {
        let q: Question = serde_json::from_value(serde_json::json!({
            "question": "2 + 2?",
            "options": ["3", "4"],
            "correctAnswer": 1
        }))
        .unwrap();
        assert_eq!(q.points, 1);
    }

    #[test]
    fn test_answer_index_must_point_at_an_option() {
        assert!(question(1, 2).validate().is_ok());
        assert!(question(2, 2).validate().is_err());
        assert!(question(-1, 2).validate().is_err());
    }

    #[test]
    fn test_create_quiz_requires_questions() {
        let req = CreateQuizRequest {
            module_id: ObjectId::new().to_hex(),
            title: "Week 1 quiz".into(),
            questions: vec![],
            passing_score: None,
            time_limit: None,
            allow_retake: false,
        };
        let errors = req.validate().unwrap_err();
        assert_eq!(
            crate::error::first_validation_message(&errors),
            "At least one question is required"
        );
    }

    #[test]
    fn test_student_view_hides_answers() {
        let quiz = Quiz {
            id: Some(ObjectId::new()),
            title: "Week 1 quiz".into(),
            module: ObjectId::new(),
            questions: vec![question(1, 2)],
            total_points: 1,
            passing_score: 70.0,
            time_limit: 30,
            allow_retake: false,
        };
        let student = serde_json::to_value(QuizView::new(quiz.clone(), None, false)).unwrap();
        assert!(student["questions"][0].get("correctAnswer").is_none());

        let staff = serde_json::to_value(QuizView::new(quiz, None, true)).unwrap();
        assert_eq!(staff["questions"][0]["correctAnswer"], 1);
    }
}
