use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::AppResult,
    extractors::{AppJson, AppQuery},
    middlewares::auth::AuthUser,
    models::{
        api::{ApiResponse, MessageResponse},
        quiz::{CourseAttemptsQuery, CreateQuizRequest, SubmitQuizRequest, UpdateQuizRequest},
    },
    services::{quiz_service::QuizService, AppState},
    utils::mongo::parse_object_id,
};

/// GET /api/quizzes/{quizId}
pub async fn get_quiz(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(quiz_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let quiz_id = parse_object_id(&quiz_id, "quiz")?;
    let quiz = QuizService::new(state.mongo.clone())
        .get_quiz(&user, &quiz_id)
        .await?;
    Ok(ApiResponse::ok(quiz))
}

/// POST /api/quizzes/{quizId}/submit, also mounted under /api/students
pub async fn submit_quiz(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(quiz_id): Path<String>,
    AppJson(req): AppJson<SubmitQuizRequest>,
) -> AppResult<impl IntoResponse> {
    let quiz_id = parse_object_id(&quiz_id, "quiz")?;
    let result = QuizService::new(state.mongo.clone())
        .submit(&user, &quiz_id, req)
        .await?;

    let message = if result.attempt.passed {
        "Congratulations! You passed the quiz."
    } else {
        "Quiz submitted. Keep practicing!"
    };
    Ok((StatusCode::CREATED, ApiResponse::with_message(message, result)))
}

/// GET /api/quizzes/{quizId}/results, also mounted under /api/students
pub async fn quiz_results(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(quiz_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let quiz_id = parse_object_id(&quiz_id, "quiz")?;
    let results = QuizService::new(state.mongo.clone())
        .results(&user, &quiz_id)
        .await?;
    Ok(ApiResponse::ok(results))
}

/// GET /api/quizzes/course/{courseId}/attempts
pub async fn my_course_attempts(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(course_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let course_id = parse_object_id(&course_id, "course")?;
    let attempts = QuizService::new(state.mongo.clone())
        .student_course_attempts(&user, &course_id)
        .await?;
    Ok(ApiResponse::ok(attempts))
}

/// POST /api/quizzes
pub async fn create_quiz(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(req): AppJson<CreateQuizRequest>,
) -> AppResult<impl IntoResponse> {
    user.ensure_staff()?;
    req.validate()?;

    let quiz = QuizService::new(state.mongo.clone())
        .create_quiz(&user, req)
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Quiz created successfully", quiz),
    ))
}

/// PUT /api/quizzes/{quizId}
pub async fn update_quiz(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(quiz_id): Path<String>,
    AppJson(req): AppJson<UpdateQuizRequest>,
) -> AppResult<impl IntoResponse> {
    user.ensure_staff()?;
    let quiz_id = parse_object_id(&quiz_id, "quiz")?;
    req.validate()?;

    let quiz = QuizService::new(state.mongo.clone())
        .update_quiz(&user, &quiz_id, req)
        .await?;
    Ok(ApiResponse::with_message("Quiz updated successfully", quiz))
}

/// DELETE /api/quizzes/{quizId}
pub async fn delete_quiz(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(quiz_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    user.ensure_staff()?;
    let quiz_id = parse_object_id(&quiz_id, "quiz")?;

    QuizService::new(state.mongo.clone())
        .delete_quiz(&user, &quiz_id)
        .await?;
    Ok(MessageResponse::new("Quiz deleted successfully"))
}

/// GET /api/quizzes/admin/course/{courseId}/attempts
pub async fn course_attempts(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(course_id): Path<String>,
    AppQuery(query): AppQuery<CourseAttemptsQuery>,
) -> AppResult<impl IntoResponse> {
    user.ensure_staff()?;
    let course_id = parse_object_id(&course_id, "course")?;

    let (attempts, pagination) = QuizService::new(state.mongo.clone())
        .course_attempts(&user, &course_id, query)
        .await?;
    Ok(ApiResponse::paginated(attempts, pagination))
}
