mod assignments;
mod batches;
mod students;

pub use assignments::*;
pub use batches::*;
pub use students::*;

use axum::{extract::State, response::IntoResponse};
use std::sync::Arc;

use crate::{
    error::AppResult,
    extractors::AppQuery,
    models::{analytics::AnalyticsQuery, api::ApiResponse, course::AdminCoursesQuery},
    services::{admin_service::AdminService, AppState},
};

/// GET /api/admin/dashboard
pub async fn dashboard(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let dashboard = AdminService::new(state.mongo.clone()).dashboard().await?;
    Ok(ApiResponse::ok(dashboard))
}

/// GET /api/admin/courses
pub async fn list_courses(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<AdminCoursesQuery>,
) -> AppResult<impl IntoResponse> {
    let (courses, pagination) = AdminService::new(state.mongo.clone())
        .list_courses(query)
        .await?;
    Ok(ApiResponse::paginated(courses, pagination))
}

/// GET /api/admin/analytics?timeframe=week|month|year
pub async fn analytics(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<AnalyticsQuery>,
) -> AppResult<impl IntoResponse> {
    let analytics = AdminService::new(state.mongo.clone())
        .analytics(query)
        .await?;
    Ok(ApiResponse::ok(analytics))
}
