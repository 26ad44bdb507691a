//! HTTP collaborators: ask a resource for hits, ask the mother about an
//! unknown resource. URLs carry private parameters, so they are never logged.

use std::time::Duration;

use async_trait::async_trait;
use fedsearch_core::{FetchError, Fetcher, Hit, Resource, Suggester};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

const USER_AGENT: &str = concat!("fedsearch/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    async fn get_json(&self, url: String) -> Result<Value, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Transport("request timed out".to_string())
            } else {
                FetchError::Transport(e.without_url().to_string())
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        response.json::<Value>().await.map_err(|e| FetchError::Payload(e.without_url().to_string()))
    }
}

/// `{"hits": [...]}` → hits; members that are not objects are skipped.
pub fn parse_hits(value: &Value) -> Result<Vec<Hit>, FetchError> {
    let hits = value
        .get("hits")
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::Payload("missing hits array".to_string()))?;
    Ok(hits.iter().filter(|h| h.is_object()).map(Hit::from_json).collect())
}

/// `{"resource": {...}}` → the described resource; absent or null means the
/// mother does not know it.
pub fn parse_resource(value: &Value) -> Result<Option<Resource>, FetchError> {
    match value.get("resource") {
        None | Some(Value::Null) => Ok(None),
        Some(described) => Resource::from_json(described).map(Some).map_err(|e| FetchError::Payload(e.to_string())),
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch(&self, resource: &Resource, query: &str) -> Result<Vec<Hit>, FetchError> {
        debug!(rid = resource.id(), "requesting hits");
        let body = self.get_json(resource.api_url(query)).await?;
        parse_hits(&body)
    }
}

#[async_trait]
impl Suggester for HttpClient {
    async fn suggest(&self, mother: &Resource, unknown_id: &str) -> Result<Option<Resource>, FetchError> {
        debug!(mother = mother.id(), rid = unknown_id, "asking mother");
        match self.get_json(mother.resource_url(unknown_id)).await {
            Ok(body) => parse_resource(&body),
            Err(FetchError::Status(code)) if code == StatusCode::NOT_FOUND.as_u16() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
