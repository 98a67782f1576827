use async_trait::async_trait;
use reqwest::Client;

use super::client::{handle_response, http_client};
use super::types::ViewResponse;
use crate::config::Config;
use crate::error::{CheckerError, Result};
use crate::video::LegacyIdLookup;

/// Bilibili web API client, used to turn `av` ids into `BV` ids
pub struct BilibiliClient {
    client: Client,
    view_api_url: String,
}

impl BilibiliClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            http_client(config.bilibili.timeout_secs)?,
            &config.bilibili.view_api_url,
        ))
    }

    pub fn new(client: Client, view_api_url: &str) -> Self {
        Self {
            client,
            view_api_url: view_api_url.to_string(),
        }
    }

    /// Look up the `BV` id of legacy video `aid`
    pub async fn bvid_for_aid(&self, aid: u64) -> Result<String> {
        let response = self
            .client
            .get(&self.view_api_url)
            .query(&[("aid", aid.to_string())])
            .send()
            .await?;

        let view: ViewResponse = handle_response(response).await?;

        if view.code != 0 {
            return Err(CheckerError::ApiError(format!(
                "Bilibili returned code {} for av{}: {}",
                view.code,
                aid,
                view.message.unwrap_or_default()
            )));
        }

        view.data
            .and_then(|data| data.bvid)
            .map(|bvid| bvid.trim().to_string())
            .filter(|bvid| bvid.starts_with("BV") && bvid.len() > 2)
            .ok_or_else(|| CheckerError::ApiError(format!("No bvid in response for av{}", aid)))
    }
}

#[async_trait]
impl LegacyIdLookup for BilibiliClient {
    async fn canonical_id(&self, aid: u64) -> Result<String> {
        self.bvid_for_aid(aid).await
    }
}
