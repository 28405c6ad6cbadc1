use serde::Serialize;

/// Metadata returned for each stored upload
#[derive(Debug, Clone, Serialize)]
pub struct UploadedFile {
    pub filename: String,
    pub originalname: String,
    pub mimetype: String,
    pub size: u64,
    pub folder: String,
    pub url: String,
    /// Resource kind (pdf, video, ...) for lesson resources
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadBatch {
    pub files: Vec<UploadedFile>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ResourceBatch {
    pub resources: Vec<UploadedFile>,
    pub count: usize,
}
