use serde::{Deserialize, Serialize};

/// Metadata for one stored item, as returned by intake and listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// Display name
    pub name: String,
    /// Storage name, also the download path segment
    pub path: String,
    pub size: u64,
    /// Epoch milliseconds
    pub upload_time: i64,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub files: Vec<FileInfo>,
}

#[derive(Debug, Serialize)]
pub struct SaveTextResponse {
    pub success: bool,
    pub file: FileInfo,
}

#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub success: bool,
    pub files: Vec<FileInfo>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
    pub results: Vec<DeleteResult>,
}

/// Outcome of removing a single item in a batch delete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeleteResult {
    pub name: String,
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaveTextRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub files: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<DeleteResult>>,
}
