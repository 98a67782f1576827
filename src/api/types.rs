use serde::{Deserialize, Serialize};

/// `check_identifier.php?output=json` response
#[derive(Debug, Deserialize)]
pub struct CheckIdentifierResponse {
    /// `"available"` when no item uses the identifier yet
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub response_type: Option<String>,
    pub message: Option<String>,
}

/// Sentinel code meaning the identifier is free, i.e. nothing is archived there.
pub const IDENTIFIER_AVAILABLE: &str = "available";

/// Bilibili `x/web-interface/view` response envelope
#[derive(Debug, Deserialize)]
pub struct ViewResponse {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<ViewData>,
}

#[derive(Debug, Deserialize)]
pub struct ViewData {
    pub bvid: Option<String>,
    pub aid: Option<u64>,
    pub title: Option<String>,
}

/// Archiver task state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Downloading,
    Uploading,
    Finished,
    Failed,
    NotFound,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Downloading => "downloading",
            TaskState::Uploading => "uploading",
            TaskState::Finished => "finished",
            TaskState::Failed => "failed",
            TaskState::NotFound => "not_found",
            TaskState::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// `GET /archive/{vid}` response from the archiver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatus {
    pub success: bool,
    pub vid: String,
    pub status: TaskState,
    pub queue_index: Option<usize>,
}
