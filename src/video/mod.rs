//! Working out which video (and which part of it) a page is showing.

mod location;
mod providers;
mod resolver;

pub use location::{normalize_user_input, VideoLocation};
pub use providers::{first_bvid, first_page, ContextProvider, PageSnapshot, DEFAULT_PROVIDERS, PAGE_STATE_SCRIPT};
pub use resolver::{ContextResolver, LegacyIdLookup, PageState, Resolution, ResolutionFailure};

/// A video on a page, as seen at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReference {
    /// `BV…` canonical id, or the digits of a legacy `av` id before resolution.
    pub raw_id: String,
    /// 1-based part number of a multi-part video.
    pub page_index: u32,
}

impl VideoReference {
    pub fn new(raw_id: impl Into<String>, page_index: u32) -> Self {
        Self {
            raw_id: raw_id.into(),
            page_index: page_index.max(1),
        }
    }
}
