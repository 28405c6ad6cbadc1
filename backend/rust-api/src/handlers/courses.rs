use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    extractors::{AppJson, AppQuery},
    middlewares::auth::AuthUser,
    models::{
        api::{ApiResponse, MessageResponse},
        course::{CreateCourseRequest, EnrollRequest, ListCoursesQuery, UpdateCourseRequest},
        lesson::{CreateLessonRequest, UpdateLessonRequest},
        module::{CreateModuleRequest, UpdateModuleRequest},
    },
    services::{course_service::CourseService, enrollment_service::EnrollmentService, AppState},
    utils::mongo::parse_object_id,
};

/// GET /api/courses
pub async fn list_courses(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<ListCoursesQuery>,
) -> AppResult<impl IntoResponse> {
    let (courses, pagination) = CourseService::new(state.mongo.clone())
        .list_courses(query)
        .await?;
    Ok(ApiResponse::paginated(courses, pagination))
}

/// GET /api/courses/{id} - anonymous callers are allowed
pub async fn get_course(
    State(state): State<Arc<AppState>>,
    user: Option<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let course_id = parse_object_id(&id, "course")?;
    let detail = CourseService::new(state.mongo.clone())
        .get_course_detail(&course_id, user.as_ref())
        .await?;
    Ok(ApiResponse::ok(detail))
}

/// POST /api/courses
pub async fn create_course(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(req): AppJson<CreateCourseRequest>,
) -> AppResult<impl IntoResponse> {
    user.ensure_staff()?;
    req.validate()?;

    let course = CourseService::new(state.mongo.clone())
        .create_course(&user, req)
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Course created successfully", course),
    ))
}

/// PUT /api/courses/{id}
pub async fn update_course(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateCourseRequest>,
) -> AppResult<impl IntoResponse> {
    user.ensure_staff()?;
    let course_id = parse_object_id(&id, "course")?;
    req.validate()?;

    let course = CourseService::new(state.mongo.clone())
        .update_course(&user, &course_id, req)
        .await?;
    Ok(ApiResponse::with_message("Course updated successfully", course))
}

/// DELETE /api/courses/{id}
pub async fn delete_course(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    user.ensure_staff()?;
    let course_id = parse_object_id(&id, "course")?;
    CourseService::new(state.mongo.clone())
        .delete_course(&user, &course_id)
        .await?;
    Ok(MessageResponse::new("Course deleted successfully"))
}

/// The enroll body is optional: an empty body means the default batch.
fn enroll_request(body: &[u8]) -> AppResult<EnrollRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(EnrollRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::bad_request(format!("Invalid request body: {}", e)))
}

/// POST /api/courses/{id}/enroll
pub async fn enroll(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let course_id = parse_object_id(&id, "course")?;
    let req = enroll_request(&body)?;

    let enrollment = EnrollmentService::new(state.mongo.clone())
        .enroll(&user, &course_id, req.batch)
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Enrolled successfully", enrollment),
    ))
}

/// GET /api/courses/{id}/progress
pub async fn course_progress(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let course_id = parse_object_id(&id, "course")?;
    let progress = EnrollmentService::new(state.mongo.clone())
        .course_progress(&user, &course_id)
        .await?;
    Ok(ApiResponse::ok(progress))
}

/// POST /api/courses/{id}/lessons/{lessonId}/complete
pub async fn complete_lesson(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((id, lesson_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let course_id = parse_object_id(&id, "course")?;
    let lesson_id = parse_object_id(&lesson_id, "lesson")?;

    let progress = EnrollmentService::new(state.mongo.clone())
        .complete_lesson(&user, &course_id, &lesson_id)
        .await?;
    Ok(ApiResponse::with_message("Lesson marked as complete", progress))
}

/// POST /api/courses/{id}/modules
pub async fn create_module(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    AppJson(req): AppJson<CreateModuleRequest>,
) -> AppResult<impl IntoResponse> {
    user.ensure_staff()?;
    let course_id = parse_object_id(&id, "course")?;
    req.validate()?;

    let module = CourseService::new(state.mongo.clone())
        .create_module(&user, &course_id, req)
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Module created successfully", module),
    ))
}

/// PUT /api/courses/{id}/modules/{moduleId}
pub async fn update_module(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((id, module_id)): Path<(String, String)>,
    AppJson(req): AppJson<UpdateModuleRequest>,
) -> AppResult<impl IntoResponse> {
    user.ensure_staff()?;
    let course_id = parse_object_id(&id, "course")?;
    let module_id = parse_object_id(&module_id, "module")?;
    req.validate()?;

    let module = CourseService::new(state.mongo.clone())
        .update_module(&user, &course_id, &module_id, req)
        .await?;
    Ok(ApiResponse::with_message("Module updated successfully", module))
}

/// DELETE /api/courses/{id}/modules/{moduleId}
pub async fn delete_module(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((id, module_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    user.ensure_staff()?;
    let course_id = parse_object_id(&id, "course")?;
    let module_id = parse_object_id(&module_id, "module")?;

    CourseService::new(state.mongo.clone())
        .delete_module(&user, &course_id, &module_id)
        .await?;
    Ok(MessageResponse::new("Module deleted successfully"))
}

/// POST /api/courses/{id}/modules/{moduleId}/lessons
pub async fn create_lesson(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((id, module_id)): Path<(String, String)>,
    AppJson(req): AppJson<CreateLessonRequest>,
) -> AppResult<impl IntoResponse> {
    user.ensure_staff()?;
    let course_id = parse_object_id(&id, "course")?;
    let module_id = parse_object_id(&module_id, "module")?;
    req.validate()?;

    let lesson = CourseService::new(state.mongo.clone())
        .create_lesson(&user, &course_id, &module_id, req)
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Lesson created successfully", lesson),
    ))
}

/// PUT /api/courses/{id}/lessons/{lessonId}
pub async fn update_lesson(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((id, lesson_id)): Path<(String, String)>,
    AppJson(req): AppJson<UpdateLessonRequest>,
) -> AppResult<impl IntoResponse> {
    user.ensure_staff()?;
    let course_id = parse_object_id(&id, "course")?;
    let lesson_id = parse_object_id(&lesson_id, "lesson")?;
    req.validate()?;

    let lesson = CourseService::new(state.mongo.clone())
        .update_lesson(&user, &course_id, &lesson_id, req)
        .await?;
    Ok(ApiResponse::with_message("Lesson updated successfully", lesson))
}

/// DELETE /api/courses/{id}/lessons/{lessonId}
pub async fn delete_lesson(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((id, lesson_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    user.ensure_staff()?;
    let course_id = parse_object_id(&id, "course")?;
    let lesson_id = parse_object_id(&lesson_id, "lesson")?;

    CourseService::new(state.mongo.clone())
        .delete_lesson(&user, &course_id, &lesson_id)
        .await?;
    Ok(MessageResponse::new("Lesson deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enroll_request_body_is_optional() {
        assert!(enroll_request(b"").unwrap().batch.is_none());
        assert!(enroll_request(b"  \n").unwrap().batch.is_none());
        assert_eq!(
            enroll_request(br#"{"batch":"Evening"}"#).unwrap().batch.as_deref(),
            Some("Evening")
        );
        assert!(enroll_request(b"{oops").is_err());
    }
}
