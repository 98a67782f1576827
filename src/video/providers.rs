use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Evaluated in the page to collect its location and the globals the player
/// injects. Only the fields we read are copied out, since `__INITIAL_STATE__`
/// can be large and is not guaranteed to be serializable.
pub const PAGE_STATE_SCRIPT: &str = r#"(() => {
    const state = window.__INITIAL_STATE__;
    const vd = window.vd;
    return {
        location: window.location.href,
        injected: {
            initialState: state ? { bvid: state.bvid ?? null, p: state.p ?? null } : null,
            vd: vd ? { bvid: vd.bvid ?? null, p: vd.embedPlayer?.p ?? null } : null
        }
    };
})()"#;

/// Location plus injected globals of a page at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub location: String,
    #[serde(default)]
    pub injected: Value,
}

impl PageSnapshot {
    /// Snapshot of a page known only by its URL.
    pub fn from_location(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            injected: Value::Null,
        }
    }
}

/// One source of page-injected video context.
#[derive(Clone, Copy)]
pub struct ContextProvider {
    pub name: &'static str,
    pub bvid: fn(&Value) -> Option<String>,
    pub page: fn(&Value) -> Option<u32>,
}

/// Providers in the order they are consulted.
pub const DEFAULT_PROVIDERS: &[ContextProvider] = &[
    ContextProvider {
        name: "__INITIAL_STATE__",
        bvid: initial_state_bvid,
        page: initial_state_page,
    },
    ContextProvider {
        name: "vd",
        bvid: vd_bvid,
        page: vd_page,
    },
];

fn initial_state_bvid(v: &Value) -> Option<String> {
    string_at(v, &["initialState", "bvid"])
}

fn initial_state_page(v: &Value) -> Option<u32> {
    page_at(v, &["initialState", "p"])
}

fn vd_bvid(v: &Value) -> Option<String> {
    string_at(v, &["vd", "bvid"])
}

fn vd_page(v: &Value) -> Option<u32> {
    page_at(v, &["vd", "p"])
}

/// First provider that knows the canonical id.
pub fn first_bvid(providers: &[ContextProvider], injected: &Value) -> Option<String> {
    providers.iter().find_map(|p| {
        let found = (p.bvid)(injected);
        if found.is_some() {
            tracing::debug!("bvid found via {}", p.name);
        }
        found
    })
}

/// First provider that knows the page index.
pub fn first_page(providers: &[ContextProvider], injected: &Value) -> Option<u32> {
    providers.iter().find_map(|p| (p.page)(injected))
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.get(key))
}

fn string_at(value: &Value, path: &[&str]) -> Option<String> {
    lookup(value, path)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// The player sometimes stores `p` as a string.
fn page_at(value: &Value, path: &[&str]) -> Option<u32> {
    let raw = lookup(value, path)?;
    let page = match raw {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    page.filter(|p| *p > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn initial_state_wins_over_vd() {
        let injected = json!({
            "initialState": { "bvid": "BV1HP411D7Rj", "p": 2 },
            "vd": { "bvid": "BV1xx411c7mD", "p": 5 }
        });
        assert_eq!(
            first_bvid(DEFAULT_PROVIDERS, &injected).as_deref(),
            Some("BV1HP411D7Rj")
        );
        assert_eq!(first_page(DEFAULT_PROVIDERS, &injected), Some(2));
    }

    #[test]
    fn falls_back_field_by_field() {
        let injected = json!({
            "initialState": { "bvid": "BV1HP411D7Rj", "p": null },
            "vd": { "bvid": null, "p": "3" }
        });
        assert_eq!(
            first_bvid(DEFAULT_PROVIDERS, &injected).as_deref(),
            Some("BV1HP411D7Rj")
        );
        assert_eq!(first_page(DEFAULT_PROVIDERS, &injected), Some(3));
    }

    #[test]
    fn missing_globals_yield_nothing() {
        let injected = json!({ "initialState": null, "vd": null });
        assert_eq!(first_bvid(DEFAULT_PROVIDERS, &injected), None);
        assert_eq!(first_page(DEFAULT_PROVIDERS, &injected), None);
        assert_eq!(first_bvid(DEFAULT_PROVIDERS, &Value::Null), None);
    }

    #[test]
    fn rejects_blank_ids_and_bad_pages() {
        let injected = json!({
            "initialState": { "bvid": "  ", "p": 0 },
            "vd": { "p": "two" }
        });
        assert_eq!(first_bvid(DEFAULT_PROVIDERS, &injected), None);
        assert_eq!(first_page(DEFAULT_PROVIDERS, &injected), None);
    }

    #[test]
    fn snapshot_deserializes_script_output() {
        let raw = json!({
            "location": "https://www.bilibili.com/video/BV1HP411D7Rj",
            "injected": { "initialState": { "bvid": "BV1HP411D7Rj", "p": 1 }, "vd": null }
        });
        let snapshot: PageSnapshot = serde_json::from_value(raw).unwrap();
        assert_eq!(snapshot.location, "https://www.bilibili.com/video/BV1HP411D7Rj");
        assert_eq!(first_page(DEFAULT_PROVIDERS, &snapshot.injected), Some(1));
    }
}
