use async_trait::async_trait;
use reqwest::Client;

use super::client::{handle_response, http_client};
use super::types::{CheckIdentifierResponse, IDENTIFIER_AVAILABLE};
use crate::config::Config;
use crate::error::Result;
use crate::identifier::ArchiveIdentifier;
use crate::reconcile::StatusQuery;
use crate::status::ArchiveStatus;

/// Internet Archive identifier registry client
pub struct RegistryClient {
    client: Client,
    check_url: String,
    details_url: String,
}

impl RegistryClient {
    /// Create a new registry client from config
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            http_client(config.registry.timeout_secs)?,
            &config.registry.check_url,
            &config.registry.details_url,
        ))
    }

    pub fn new(client: Client, check_url: &str, details_url: &str) -> Self {
        Self {
            client,
            check_url: check_url.to_string(),
            details_url: details_url.to_string(),
        }
    }

    /// Detail page of an item. Derived locally, never returned by the server.
    pub fn detail_url(&self, identifier: &ArchiveIdentifier) -> String {
        format!("{}{}", self.details_url, identifier)
    }

    /// Ask whether an item exists under `identifier`. Every failure maps to
    /// [`ArchiveStatus::QueryFailed`]; there are no retries here.
    pub async fn check(&self, identifier: &ArchiveIdentifier) -> ArchiveStatus {
        match self.fetch(identifier).await {
            Ok(response) => self.classify(identifier, &response),
            Err(e) => {
                tracing::warn!("Status query for {} failed: {}", identifier, e);
                ArchiveStatus::QueryFailed
            }
        }
    }

    async fn fetch(&self, identifier: &ArchiveIdentifier) -> Result<CheckIdentifierResponse> {
        tracing::debug!("Querying {} for {}", self.check_url, identifier);

        let response = self
            .client
            .get(&self.check_url)
            .query(&[("output", "json"), ("identifier", identifier.as_str())])
            .send()
            .await?;

        handle_response(response).await
    }

    pub fn classify(
        &self,
        identifier: &ArchiveIdentifier,
        response: &CheckIdentifierResponse,
    ) -> ArchiveStatus {
        match response.code.as_deref() {
            Some(IDENTIFIER_AVAILABLE) => ArchiveStatus::NotArchived,
            Some(_) => ArchiveStatus::Archived {
                detail_url: self.detail_url(identifier),
            },
            None => {
                tracing::warn!(
                    "Registry response for {} has no code: {:?}",
                    identifier,
                    response.message
                );
                ArchiveStatus::QueryFailed
            }
        }
    }
}

#[async_trait]
impl StatusQuery for RegistryClient {
    async fn query_status(&self, identifier: &ArchiveIdentifier) -> ArchiveStatus {
        self.check(identifier).await
    }
}
