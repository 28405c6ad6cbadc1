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
        api::ApiResponse, assignment::SubmitAssignmentRequest, enrollment::StudentCoursesQuery,
        user::UpdateProfileRequest,
    },
    services::{
        assignment_service::AssignmentService, student_service::StudentService, AppState,
    },
    utils::mongo::parse_object_id,
};

/// GET /api/students/dashboard
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let dashboard = StudentService::new(state.mongo.clone())
        .dashboard(&user)
        .await?;
    Ok(ApiResponse::ok(dashboard))
}

/// GET /api/students/courses
pub async fn enrolled_courses(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppQuery(query): AppQuery<StudentCoursesQuery>,
) -> AppResult<impl IntoResponse> {
    let (courses, pagination) = StudentService::new(state.mongo.clone())
        .enrolled_courses(&user, query)
        .await?;
    Ok(ApiResponse::paginated(courses, pagination))
}

/// GET /api/students/courses/{courseId}
pub async fn course_detail(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(course_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let course_id = parse_object_id(&course_id, "course")?;
    let detail = StudentService::new(state.mongo.clone())
        .course_detail(&user, &course_id)
        .await?;
    Ok(ApiResponse::ok(detail))
}

/// GET /api/students/courses/{courseId}/lessons/{lessonId}
pub async fn lesson_detail(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((course_id, lesson_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let course_id = parse_object_id(&course_id, "course")?;
    let lesson_id = parse_object_id(&lesson_id, "lesson")?;

    let lesson = StudentService::new(state.mongo.clone())
        .lesson_detail(&user, &course_id, &lesson_id)
        .await?;
    Ok(ApiResponse::ok(lesson))
}

/// GET /api/students/courses/{courseId}/progress
pub async fn course_progress(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(course_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let course_id = parse_object_id(&course_id, "course")?;
    let progress = StudentService::new(state.mongo.clone())
        .student_progress(&user, &course_id)
        .await?;
    Ok(ApiResponse::ok(progress))
}

/// POST /api/students/assignments - 201 for a first submission, 200 when it
/// replaces an earlier one
pub async fn submit_assignment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(req): AppJson<SubmitAssignmentRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let (assignment, created) = AssignmentService::new(state.mongo.clone())
        .submit(&user, req)
        .await?;

    let response = if created {
        (
            StatusCode::CREATED,
            ApiResponse::with_message("Assignment submitted successfully", assignment),
        )
    } else {
        (
            StatusCode::OK,
            ApiResponse::with_message("Assignment resubmitted successfully", assignment),
        )
    };
    Ok(response)
}

/// PUT /api/students/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(req): AppJson<UpdateProfileRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let profile = StudentService::new(state.mongo.clone())
        .update_profile(&user, req)
        .await?;
    Ok(ApiResponse::with_message("Profile updated successfully", profile))
}
