use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, Multipart, Path, Request, State},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::{
    error::{AppError, AppResult},
    middlewares::auth::AuthUser,
    models::{
        api::ApiResponse,
        upload::{ResourceBatch, UploadBatch},
    },
    services::{
        upload_service::{resource_kind, IncomingFile},
        AppState,
    },
};

/// Which multipart field carries the files and how many are accepted
#[derive(Debug, Clone, Copy)]
struct FileField {
    name: &'static str,
    max: usize,
}

const AVATAR: FileField = FileField { name: "avatar", max: 1 };
const THUMBNAIL: FileField = FileField { name: "thumbnail", max: 1 };
const ASSIGNMENT_FILES: FileField = FileField { name: "files", max: 3 };
const LESSON_RESOURCES: FileField = FileField { name: "resources", max: 5 };

impl FileField {
    /// Accept a file part. Text parts are ignored by the caller.
    fn accept(&self, field_name: &str, received: usize) -> AppResult<()> {
        if field_name != self.name {
            return Err(AppError::bad_request("Unexpected field"));
        }
        if received >= self.max {
            return Err(AppError::bad_request(if self.max == 1 {
                "Too many files. Only one file is allowed.".to_string()
            } else {
                format!("Too many files. Maximum {} files allowed.", self.max)
            }));
        }
        Ok(())
    }
}

async fn read_files(
    multipart: Result<Multipart, MultipartRejection>,
    expected: FileField,
) -> AppResult<Vec<IncomingFile>> {
    let mut multipart =
        multipart.map_err(|e| AppError::bad_request(format!("Invalid upload: {}", e.body_text())))?;

    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("Invalid upload: {}", e.body_text())))?
    {
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        expected.accept(field.name().unwrap_or_default(), files.len())?;

        let mimetype = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field.bytes().await.map_err(|e| {
            tracing::warn!("Failed to read upload data: {}", e);
            AppError::bad_request("Failed to read upload")
        })?;

        files.push(IncomingFile {
            original_name,
            mimetype,
            data: data.to_vec(),
        });
    }
    Ok(files)
}

async fn store_single(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
    expected: FileField,
    message: &str,
) -> AppResult<Response> {
    let files = read_files(multipart, expected).await?;
    if files.is_empty() {
        return Err(AppError::bad_request("No file uploaded"));
    }

    let stored = state
        .uploads
        .store_all(files)
        .await?
        .pop()
        .ok_or_else(|| AppError::bad_request("No file uploaded"))?;
    Ok(ApiResponse::with_message(message, stored).into_response())
}

/// POST /api/uploads/profile-picture
pub async fn upload_profile_picture(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Response> {
    store_single(&state, multipart, AVATAR, "File uploaded successfully").await
}

/// POST /api/uploads/course-thumbnail
pub async fn upload_course_thumbnail(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Response> {
    user.ensure_staff()?;
    store_single(
        &state,
        multipart,
        THUMBNAIL,
        "Course thumbnail uploaded successfully",
    )
    .await
}

/// POST /api/uploads/assignment
pub async fn upload_assignment_files(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<impl IntoResponse> {
    let files = read_files(multipart, ASSIGNMENT_FILES).await?;
    if files.is_empty() {
        return Err(AppError::bad_request("No files uploaded"));
    }

    let files = state.uploads.store_all(files).await?;
    Ok(ApiResponse::with_message(
        "Assignment files uploaded successfully",
        UploadBatch {
            count: files.len(),
            files,
        },
    ))
}

/// POST /api/uploads/lesson-resources
pub async fn upload_lesson_resources(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<impl IntoResponse> {
    user.ensure_staff()?;
    let files = read_files(multipart, LESSON_RESOURCES).await?;
    if files.is_empty() {
        return Err(AppError::bad_request("No files uploaded"));
    }

    let resources: Vec<_> = state
        .uploads
        .store_all(files)
        .await?
        .into_iter()
        .map(|mut file| {
            file.kind = Some(resource_kind(&file.mimetype).to_string());
            file
        })
        .collect();

    Ok(ApiResponse::with_message(
        "Lesson resources uploaded successfully",
        ResourceBatch {
            count: resources.len(),
            resources,
        },
    ))
}

async fn serve(state: &AppState, folder: Option<&str>, filename: &str, request: Request) -> AppResult<Response> {
    let path = state
        .uploads
        .resolve(folder, filename)
        .ok_or_else(|| AppError::not_found("File not found"))?;

    let is_file = tokio::fs::metadata(&path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(AppError::not_found("File not found"));
    }

    let response = ServeFile::new(&path)
        .oneshot(request)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to serve {}: {}", path.display(), e))?;
    Ok(response.map(Body::new))
}

/// GET /api/uploads/{filename}
pub async fn serve_root_file(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
    request: Request,
) -> AppResult<Response> {
    serve(&state, None, &filename, request).await
}

/// GET /api/uploads/{folder}/{filename}
pub async fn serve_folder_file(
    State(state): State<Arc<AppState>>,
    Path((folder, filename)): Path<(String, String)>,
    request: Request,
) -> AppResult<Response> {
    serve(&state, Some(&folder), &filename, request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_field_limits() {
        assert!(ASSIGNMENT_FILES.accept("files", 0).is_ok());
        assert!(ASSIGNMENT_FILES.accept("files", 2).is_ok());
        assert_eq!(
            ASSIGNMENT_FILES.accept("files", 3).unwrap_err().to_string(),
            "Too many files. Maximum 3 files allowed."
        );
        assert_eq!(
            LESSON_RESOURCES.accept("files", 0).unwrap_err().to_string(),
            "Unexpected field"
        );
        assert!(AVATAR.accept("avatar", 0).is_ok());
        assert!(AVATAR.accept("avatar", 1).is_err());
        assert!(THUMBNAIL.accept("avatar", 0).is_err());
    }
}
