use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::AppResult,
    extractors::{AppJson, AppQuery},
    models::{
        analytics::RosterQuery,
        api::{ApiResponse, MessageResponse, PageQuery},
        user::{ListStudentsQuery, UpdateStudentRequest},
    },
    services::{admin_service::AdminService, AppState},
    utils::mongo::parse_object_id,
};

/// GET /api/admin/students
pub async fn list_students(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<ListStudentsQuery>,
) -> AppResult<impl IntoResponse> {
    let (students, pagination) = AdminService::new(state.mongo.clone())
        .list_students(query)
        .await?;
    Ok(ApiResponse::paginated(students, pagination))
}

/// GET /api/admin/students/{id}/enrollments
pub async fn student_enrollments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppQuery(query): AppQuery<PageQuery>,
) -> AppResult<impl IntoResponse> {
    let student_id = parse_object_id(&id, "student")?;
    let (enrollments, pagination) = AdminService::new(state.mongo.clone())
        .student_enrollments(&student_id, query)
        .await?;
    Ok(ApiResponse::paginated(enrollments, pagination))
}

/// PUT /api/admin/students/{id}
pub async fn update_student(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateStudentRequest>,
) -> AppResult<impl IntoResponse> {
    let student_id = parse_object_id(&id, "student")?;
    req.validate()?;

    let student = AdminService::new(state.mongo.clone())
        .update_student(&student_id, req)
        .await?;
    Ok(ApiResponse::with_message("Student updated successfully", student))
}

/// DELETE /api/admin/students/{id}
pub async fn delete_student(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let student_id = parse_object_id(&id, "student")?;
    AdminService::new(state.mongo.clone())
        .delete_student(&student_id)
        .await?;
    tracing::info!("Student {} deleted by admin", student_id);
    Ok(MessageResponse::new("Student deleted successfully"))
}

/// GET /api/admin/courses/{courseId}/enrollments?batch=
pub async fn course_enrollments(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
    AppQuery(query): AppQuery<RosterQuery>,
) -> AppResult<impl IntoResponse> {
    let course_id = parse_object_id(&course_id, "course")?;
    let (roster, pagination) = AdminService::new(state.mongo.clone())
        .course_roster(&course_id, query)
        .await?;
    Ok(ApiResponse::paginated(roster, pagination))
}
