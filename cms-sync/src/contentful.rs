#![doc = "Contentful Delivery API client: the real `ContentSource` behind the CLI."]
//!
//! # Contentful Integration (CLI <-> Core)
//!
//! This module wires the core's [`ContentSource`] trait to the Contentful
//! Content Delivery API over `reqwest`. The core never sees HTTP; it only
//! asks for pages of entries and the content model list.
//!
//! ## Client Usage
//!
//! - Construct [`ContentfulClient`] from the environment (`CONTENTFUL_ACCESS_TOKEN`,
//!   `CONTENTFUL_SPACE_ID`, optional `CONTENTFUL_ENV` defaulting to `master`).
//! - Point it at another host with [`ContentfulClient::with_base_url`] (tests use a mock server).

use async_trait::async_trait;
use cms_sync_core::contract::{ContentSource, EntryPage, ModelDescriptor, PageRequest, SourceError};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::env;

pub const DEFAULT_BASE_URL: &str = "https://cdn.contentful.com";
pub const DEFAULT_ENVIRONMENT: &str = "master";

/// Link depth resolved by the API into `includes`.
const INCLUDE_DEPTH: &str = "2";

/// Largest page of content types the API serves.
const CONTENT_TYPE_PAGE: &str = "1000";

pub struct ContentfulClient {
    http: reqwest::Client,
    base_url: String,
    space_id: String,
    environment: String,
    access_token: String,
}

impl ContentfulClient {
    pub fn new(
        space_id: impl Into<String>,
        environment: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            space_id: space_id.into(),
            environment: environment.into(),
            access_token: access_token.into(),
        }
    }

    pub fn new_from_env() -> Result<Self, SourceError> {
        match (env::var("CONTENTFUL_ACCESS_TOKEN"), env::var("CONTENTFUL_SPACE_ID")) {
            (Ok(access_token), Ok(space_id)) => {
                let environment =
                    env::var("CONTENTFUL_ENV").unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string());
                tracing::info!(
                    token_set = !access_token.is_empty(),
                    space_id = %space_id,
                    environment = %environment,
                    "Initialized ContentfulClient from environment"
                );
                Ok(Self::new(space_id, environment, access_token))
            }
            (Err(e), _) => {
                tracing::error!(error = ?e, "CONTENTFUL_ACCESS_TOKEN missing in environment");
                Err(format!("CONTENTFUL_ACCESS_TOKEN: {e}").into())
            }
            (_, Err(e)) => {
                tracing::error!(error = ?e, "CONTENTFUL_SPACE_ID missing in environment");
                Err(format!("CONTENTFUL_SPACE_ID: {e}").into())
            }
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, resource: &str) -> String {
        format!(
            "{}/spaces/{}/environments/{}/{}",
            self.base_url, self.space_id, self.environment, resource
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<T, SourceError> {
        tracing::debug!(url = %url, ?query, "Requesting Contentful API");
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, url = %url, "Contentful request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
            tracing::error!(
                status = %status,
                url = %url,
                "Contentful API returned error. Response body: {text}"
            );
            return Err(format!("Contentful API error {status} at {url}: {text}").into());
        }

        response.json::<T>().await.map_err(|e| {
            tracing::error!(error = ?e, url = %url, "Failed to decode Contentful response");
            e.into()
        })
    }
}

#[derive(Debug, Deserialize)]
struct ContentTypeCollection {
    #[serde(default)]
    items: Vec<ModelDescriptor>,
}

#[async_trait]
impl ContentSource for ContentfulClient {
    async fn entries(&self, request: &PageRequest) -> Result<EntryPage, SourceError> {
        let mut query = request.query_pairs();
        query.push(("include".to_string(), INCLUDE_DEPTH.to_string()));
        let page: EntryPage = self.get_json(&self.endpoint("entries"), &query).await?;
        tracing::info!(
            content_type = %request.content_type,
            skip = request.skip,
            items = page.items.len(),
            total = ?page.total,
            "Fetched entry page"
        );
        Ok(page)
    }

    async fn content_type_models(&self) -> Result<Vec<ModelDescriptor>, SourceError> {
        let query = [("limit".to_string(), CONTENT_TYPE_PAGE.to_string())];
        let collection: ContentTypeCollection =
            self.get_json(&self.endpoint("content_types"), &query).await?;
        tracing::info!(models = collection.items.len(), "Fetched content type models");
        Ok(collection.items)
    }
}
