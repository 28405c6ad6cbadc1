use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::AppResult,
    extractors::AppJson,
    models::{
        api::{ApiResponse, MessageResponse},
        course::{CreateBatchRequest, UpdateBatchRequest},
    },
    services::{admin_service::AdminService, AppState},
    utils::mongo::parse_object_id,
};

/// POST /api/admin/courses/{courseId}/batches
pub async fn create_batch(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
    AppJson(req): AppJson<CreateBatchRequest>,
) -> AppResult<impl IntoResponse> {
    let course_id = parse_object_id(&course_id, "course")?;
    req.validate()?;

    let batch = AdminService::new(state.mongo.clone())
        .create_batch(&course_id, req)
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Batch created successfully", batch),
    ))
}

/// PUT /api/admin/batches/{id}
pub async fn update_batch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateBatchRequest>,
) -> AppResult<impl IntoResponse> {
    let batch_id = parse_object_id(&id, "batch")?;
    req.validate()?;

    let batch = AdminService::new(state.mongo.clone())
        .update_batch(&batch_id, req)
        .await?;
    Ok(ApiResponse::with_message("Batch updated successfully", batch))
}

/// DELETE /api/admin/batches/{id}
pub async fn delete_batch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let batch_id = parse_object_id(&id, "batch")?;
    AdminService::new(state.mongo.clone())
        .delete_batch(&batch_id)
        .await?;
    Ok(MessageResponse::new("Batch deleted successfully"))
}
