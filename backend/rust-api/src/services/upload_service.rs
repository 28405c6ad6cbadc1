use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::metrics::UPLOADS_TOTAL;
use crate::models::upload::UploadedFile;

pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;
pub const MAX_FILES_PER_REQUEST: usize = 5;

pub const FOLDERS: [&str; 4] = ["images", "videos", "documents", "general"];

const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "video/mp4",
    "video/mpeg",
    "video/quicktime",
    "application/zip",
    "application/x-rar-compressed",
];

pub fn is_allowed(mimetype: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&mimetype)
}

/// Sub-directory a file of this type is stored under
pub fn folder_for(mimetype: &str) -> &'static str {
    if mimetype.starts_with("image/") {
        "images"
    } else if mimetype.starts_with("video/") {
        "videos"
    } else if mimetype.starts_with("application/") || mimetype.starts_with("text/") {
        "documents"
    } else {
        "general"
    }
}

/// Lesson resource tag for an uploaded file
pub fn resource_kind(mimetype: &str) -> &'static str {
    if mimetype.starts_with("image/") {
        "image"
    } else if mimetype.starts_with("video/") {
        "video"
    } else if mimetype == "application/pdf" {
        "pdf"
    } else if mimetype.contains("excel") || mimetype.contains("spreadsheet") {
        "spreadsheet"
    } else if mimetype.contains("word") || mimetype.contains("document") {
        "document"
    } else if mimetype == "text/plain" {
        "text"
    } else if mimetype.contains("zip") || mimetype.contains("rar") {
        "archive"
    } else {
        "other"
    }
}

/// `<uuid>-<millis><.ext>`; the extension keeps only ASCII alphanumerics.
pub fn stored_name(original_name: &str) -> String {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ext.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
        })
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default();

    format!(
        "{}-{}{}",
        Uuid::new_v4(),
        Utc::now().timestamp_millis(),
        extension
    )
}

/// A file as read from a multipart field, before it is written
#[derive(Debug)]
pub struct IncomingFile {
    pub original_name: String,
    pub mimetype: String,
    pub data: Vec<u8>,
}

impl IncomingFile {
    pub fn check(&self) -> AppResult<()> {
        if !is_allowed(&self.mimetype) {
            return Err(AppError::bad_request(
                "Invalid file type. Only images, documents, videos, and archives are allowed.",
            ));
        }
        if self.data.len() > MAX_FILE_SIZE {
            return Err(AppError::bad_request(
                "File size too large. Maximum size is 50MB.",
            ));
        }
        Ok(())
    }
}

/// Local-disk upload storage rooted at the configured upload directory
#[derive(Debug, Clone)]
pub struct UploadStorage {
    root: PathBuf,
    public_url: String,
}

impl UploadStorage {
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn ensure_folders(&self) -> anyhow::Result<()> {
        for folder in FOLDERS {
            let dir = self.root.join(folder);
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create upload folder {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn url_for(&self, folder: &str, filename: &str) -> String {
        format!("{}/api/uploads/{}/{}", self.public_url, folder, filename)
    }

    /// Validate every file first, then write them; nothing is stored when any
    /// file is rejected or a write fails part way through the batch.
    pub async fn store_all(&self, files: Vec<IncomingFile>) -> AppResult<Vec<UploadedFile>> {
        for file in &files {
            file.check()?;
        }

        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            match self.write(file).await {
                Ok(uploaded) => stored.push(uploaded),
                Err(e) => {
                    self.remove_all(&stored).await;
                    return Err(e);
                }
            }
        }
        Ok(stored)
    }

    async fn remove_all(&self, stored: &[UploadedFile]) {
        for file in stored {
            let path = self.root.join(&file.folder).join(&file.filename);
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!("Failed to remove partial upload {}: {}", path.display(), e);
            }
        }
    }

    async fn write(&self, file: IncomingFile) -> AppResult<UploadedFile> {
        let folder = folder_for(&file.mimetype);
        let filename = stored_name(&file.original_name);
        let path = self.root.join(folder).join(&filename);

        tokio::fs::create_dir_all(self.root.join(folder))
            .await
            .context("Failed to create upload folder")?;
        tokio::fs::write(&path, &file.data)
            .await
            .with_context(|| format!("Failed to write upload {}", path.display()))?;

        UPLOADS_TOTAL.with_label_values(&[folder]).inc();
        tracing::info!(
            folder = folder,
            filename = %filename,
            size = file.data.len(),
            "File uploaded"
        );

        Ok(UploadedFile {
            url: self.url_for(folder, &filename),
            filename,
            originalname: file.original_name,
            size: file.data.len() as u64,
            folder: folder.to_string(),
            kind: None,
            mimetype: file.mimetype,
        })
    }

    /// Map a request path onto the upload root. Only single plain path segments
    /// are accepted, so `..`, absolute paths and separators never resolve.
    pub fn resolve(&self, folder: Option<&str>, filename: &str) -> Option<PathBuf> {
        let mut path = self.root.clone();
        if let Some(folder) = folder {
            if !FOLDERS.contains(&folder) {
                return None;
            }
            path.push(folder);
        }
        if !is_plain_segment(filename) {
            return None;
        }
        path.push(filename);
        Some(path)
    }
}

fn is_plain_segment(segment: &str) -> bool {
    if segment.is_empty() || segment.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incoming(name: &str, mimetype: &str, size: usize) -> IncomingFile {
        IncomingFile {
            original_name: name.to_string(),
            mimetype: mimetype.to_string(),
            data: vec![7u8; size],
        }
    }

    #[test]
    fn test_folder_classification() {
        assert_eq!(folder_for("image/png"), "images");
        assert_eq!(folder_for("video/mp4"), "videos");
        assert_eq!(folder_for("application/pdf"), "documents");
        assert_eq!(folder_for("text/plain"), "documents");
        assert_eq!(folder_for("audio/mpeg"), "general");
    }

    #[test]
    fn test_resource_kind() {
        assert_eq!(resource_kind("application/pdf"), "pdf");
        assert_eq!(
            resource_kind("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
            "spreadsheet"
        );
        assert_eq!(resource_kind("application/msword"), "document");
        assert_eq!(resource_kind("application/x-rar-compressed"), "archive");
        assert_eq!(resource_kind("text/plain"), "text");
    }

    #[test]
    fn test_stored_name_keeps_extension() {
        let name = stored_name("Lecture Notes.PDF");
        assert!(name.ends_with(".pdf"));
        // uuid (36) + '-' + millis + ext
        assert!(name.len() > 40);
        assert!(!stored_name("README").contains('.'));
        assert!(!stored_name("../../etc/passwd").contains('/'));
        assert!(stored_name("clip.m p4").ends_with(".mp4"));
    }

    #[test]
    fn test_check_rejects_type_and_size() {
        assert!(incoming("a.png", "image/png", 10).check().is_ok());
        let err = incoming("a.exe", "application/x-msdownload", 10)
            .check()
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid file type"));
        let err = incoming("big.mp4", "video/mp4", MAX_FILE_SIZE + 1)
            .check()
            .unwrap_err();
        assert_eq!(err.to_string(), "File size too large. Maximum size is 50MB.");
    }

    #[test]
    fn test_resolve_blocks_traversal() {
        let storage = UploadStorage::new("/srv/uploads", "http://localhost:5000/");
        assert_eq!(
            storage.resolve(Some("images"), "a.png"),
            Some(PathBuf::from("/srv/uploads/images/a.png"))
        );
        assert_eq!(
            storage.resolve(None, "a.png"),
            Some(PathBuf::from("/srv/uploads/a.png"))
        );
        assert!(storage.resolve(Some(".."), "passwd").is_none());
        assert!(storage.resolve(Some("etc"), "passwd").is_none());
        assert!(storage.resolve(Some("images"), "..").is_none());
        assert!(storage.resolve(None, "../secret").is_none());
        assert!(storage.resolve(None, "").is_none());
        assert_eq!(
            storage.url_for("images", "a.png"),
            "http://localhost:5000/api/uploads/images/a.png"
        );
    }

    #[tokio::test]
    async fn test_store_all_writes_into_folders() {
        let dir = tempfile::tempdir().unwrap();
        let storage = UploadStorage::new(dir.path(), "http://localhost:5000");
        storage.ensure_folders().await.unwrap();

        let stored = storage
            .store_all(vec![
                incoming("photo.png", "image/png", 16),
                incoming("notes.pdf", "application/pdf", 32),
            ])
            .await
            .unwrap();

        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].folder, "images");
        assert_eq!(stored[1].folder, "documents");
        assert_eq!(stored[1].size, 32);

        let on_disk = dir.path().join("documents").join(&stored[1].filename);
        assert_eq!(tokio::fs::read(on_disk).await.unwrap().len(), 32);
    }

    #[tokio::test]
    async fn test_store_all_is_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = UploadStorage::new(dir.path(), "http://localhost:5000");
        storage.ensure_folders().await.unwrap();

        let result = storage
            .store_all(vec![
                incoming("photo.png", "image/png", 16),
                incoming("virus.exe", "application/octet-stream", 16),
            ])
            .await;
        assert!(result.is_err());

        let mut entries = tokio::fs::read_dir(dir.path().join("images")).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_all_removes_written_files_when_a_later_write_fails() {
        let dir = tempfile::tempdir().unwrap();
        let storage = UploadStorage::new(dir.path(), "http://localhost:5000");
        tokio::fs::create_dir_all(dir.path().join("images")).await.unwrap();
        // A plain file where the documents folder should be breaks the second write
        tokio::fs::write(dir.path().join("documents"), b"").await.unwrap();

        let result = storage
            .store_all(vec![
                incoming("photo.png", "image/png", 16),
                incoming("notes.pdf", "application/pdf", 32),
            ])
            .await;
        assert!(result.is_err());

        let mut entries = tokio::fs::read_dir(dir.path().join("images")).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }
}
