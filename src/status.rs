use serde::Serialize;

/// What the registry knows about the current video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ArchiveStatus {
    #[default]
    Unknown,
    Querying,
    NotArchived,
    Archived { detail_url: String },
    ResolutionFailed,
    QueryFailed,
}

impl ArchiveStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ArchiveStatus::Unknown | ArchiveStatus::Querying)
    }
}
