use url::Url;

use crate::error::{CheckerError, Result};

const VIDEO_PATH: &str = "/video/";
const VIDEO_BASE_URL: &str = "https://www.bilibili.com/video/";

/// What a page location says about the video being shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoLocation {
    /// `/video/BV…`
    Canonical { bvid: String, page: Option<u32> },
    /// `/video/av…`, needs a lookup to become canonical
    Legacy { aid: u64, page: Option<u32> },
    /// `/video/av…` whose digits do not fit an id
    MalformedLegacy { raw: String },
    /// Anything that is not a video page
    Other,
}

impl VideoLocation {
    pub fn parse(location: &str) -> Self {
        let Ok(url) = Url::parse(location) else {
            return VideoLocation::Other;
        };

        let page = page_from_query(&url);
        let path = url.path();
        let Some(start) = path.find(VIDEO_PATH) else {
            return VideoLocation::Other;
        };
        let rest = &path[start + VIDEO_PATH.len()..];

        if let Some(bvid) = canonical_id(rest) {
            return VideoLocation::Canonical {
                bvid: bvid.to_string(),
                page,
            };
        }

        if let Some(digits) = legacy_id(rest) {
            return match digits.parse::<u64>() {
                Ok(aid) => VideoLocation::Legacy { aid, page },
                Err(_) => VideoLocation::MalformedLegacy {
                    raw: digits.to_string(),
                },
            };
        }

        VideoLocation::Other
    }

    pub fn is_video(&self) -> bool {
        !matches!(self, VideoLocation::Other)
    }
}

/// `BV` followed by at least one word character.
fn canonical_id(segment: &str) -> Option<&str> {
    let tail = segment.strip_prefix("BV")?;
    let len = tail
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
        .count();
    if len == 0 {
        return None;
    }
    Some(&segment[..2 + len])
}

/// `av` followed by at least one digit. Returns the digits unparsed.
fn legacy_id(segment: &str) -> Option<&str> {
    let tail = segment.strip_prefix("av")?;
    let len = tail.bytes().take_while(|b| b.is_ascii_digit()).count();
    if len == 0 {
        return None;
    }
    Some(&tail[..len])
}

/// The `p` query parameter, ignored when missing, non-numeric or zero.
fn page_from_query(url: &Url) -> Option<u32> {
    url.query_pairs()
        .find(|(key, _)| key == "p")
        .and_then(|(_, value)| value.parse::<u32>().ok())
        .filter(|page| *page > 0)
}

/// Turn command-line input into a video page URL.
///
/// Accepts a full URL, a `BV…` id, an `av…` id or a bare number (legacy id).
/// `page`, when given, replaces any `p` parameter already in the URL.
pub fn normalize_user_input(input: &str, page: Option<u32>) -> Result<String> {
    let input = input.trim();

    let url = if input.starts_with("http://") || input.starts_with("https://") {
        Url::parse(input).map_err(|e| CheckerError::InvalidVideo(format!("{}: {}", input, e)))?
    } else {
        let path = if let Some(bvid) = canonical_id(input).filter(|id| id.len() == input.len()) {
            bvid.to_string()
        } else if let Some(aid) = input
            .strip_prefix("av")
            .or_else(|| input.strip_prefix("AV"))
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        {
            format!("av{}", aid)
        } else if !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit()) {
            format!("av{}", input)
        } else {
            return Err(CheckerError::InvalidVideo(input.to_string()));
        };

        Url::parse(&format!("{}{}", VIDEO_BASE_URL, path))
            .map_err(|e| CheckerError::InvalidVideo(format!("{}: {}", input, e)))?
    };

    Ok(match page {
        Some(page) => with_page(url, page).to_string(),
        None => url.to_string(),
    })
}

fn with_page(mut url: Url, page: u32) -> Url {
    let others: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "p")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    // `p` goes first so it survives tracking-parameter normalization
    url.query_pairs_mut()
        .clear()
        .append_pair("p", &page.to_string())
        .extend_pairs(others.iter());
    url
}
