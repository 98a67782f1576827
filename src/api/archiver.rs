use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use super::client::{handle_response, http_client, join_url};
use super::types::QueueStatus;
use crate::config::Config;
use crate::error::{CheckerError, Result};
use crate::reconcile::ArchiveTrigger;

/// Client for the operator's archiver service (`/archive/{bvid}`)
pub struct ArchiverClient {
    client: Client,
    base_url: String,
}

impl ArchiverClient {
    /// `None` when no archiver is configured
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        match config.archiver.base_url.as_deref() {
            Some(base_url) => Ok(Some(Self::new(
                http_client(config.archiver.timeout_secs)?,
                base_url,
            ))),
            None => Ok(None),
        }
    }

    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    fn archive_url(&self, bvid: &str) -> String {
        join_url(&self.base_url, &format!("archive/{}", bvid))
    }

    /// Queue `bvid` for archiving. Only a 200 counts as accepted.
    pub async fn request_archive(&self, bvid: &str) -> Result<()> {
        let url = self.archive_url(bvid);
        tracing::info!("Sending archive request: PUT {}", url);

        let response = self.client.put(&url).send().await?;
        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(CheckerError::ApiError(format!(
                "Archiver rejected {}: {}",
                bvid, status
            ))),
        }
    }

    /// Position and state of `bvid` in the archiver queue
    pub async fn queue_status(&self, bvid: &str) -> Result<QueueStatus> {
        let response = self.client.get(self.archive_url(bvid)).send().await?;
        handle_response(response).await
    }
}

#[async_trait]
impl ArchiveTrigger for ArchiverClient {
    async fn trigger(&self, canonical_id: &str) -> Result<()> {
        self.request_archive(canonical_id).await
    }
}
