use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::AppResult,
    extractors::{AppJson, AppQuery},
    middlewares::auth::AuthUser,
    models::{
        api::ApiResponse,
        assignment::{AdminAssignmentsQuery, ReviewAssignmentRequest},
    },
    services::{assignment_service::AssignmentService, AppState},
    utils::mongo::parse_object_id,
};

/// GET /api/admin/assignments?courseId=&studentId=&status=pending|graded|all
pub async fn list_assignments(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<AdminAssignmentsQuery>,
) -> AppResult<impl IntoResponse> {
    let (queue, pagination) = AssignmentService::new(state.mongo.clone())
        .list_for_review(query)
        .await?;
    Ok(ApiResponse::paginated(queue, pagination))
}

/// PUT /api/admin/assignments/{id}/review
pub async fn review_assignment(
    State(state): State<Arc<AppState>>,
    reviewer: AuthUser,
    Path(id): Path<String>,
    AppJson(req): AppJson<ReviewAssignmentRequest>,
) -> AppResult<impl IntoResponse> {
    let assignment_id = parse_object_id(&id, "assignment")?;
    req.validate()?;

    let assignment = AssignmentService::new(state.mongo.clone())
        .review(&reviewer, &assignment_id, req)
        .await?;
    Ok(ApiResponse::with_message("Assignment reviewed successfully", assignment))
}
