//! HTTP client for the telephony provider's call and agent list operations.
//!
//! The client sits behind the [`CallService`] trait so the pagination loop
//! and the HTTP layer can be exercised independently. [`fetch_all_calls`]
//! implements the full-fetch pagination contract: fixed page size, the
//! previous page's last `call_id` as cursor, a fixed inter-page delay to
//! respect the provider rate limit (skipped after the final short page), and
//! strict failure on anything that is not a well-formed list.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::ProviderConfig;
use crate::provider::types::{
    Agent, AgentRecord, Call, FilterCriteria, ListCallsRequest, SortOrder,
};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("provider returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// Response body was not the well-formed list the operation promises.
    /// This is a loud failure on purpose: an empty page is the only valid
    /// end-of-data signal.
    #[error("malformed {operation} response: {message}")]
    Malformed {
        operation: &'static str,
        message: String,
    },

    #[error("invalid provider URL: {0}")]
    Url(#[from] url::ParseError),
}

/// The provider operations the dashboard consumes.
#[async_trait]
pub trait CallService: Send + Sync {
    /// Fetch one page of call records matching the request.
    async fn list_calls(&self, request: &ListCallsRequest) -> Result<Vec<Call>, ProviderError>;

    /// Fetch all agent records for the workspace.
    async fn list_agents(&self) -> Result<Vec<AgentRecord>, ProviderError>;
}

/// Concrete [`CallService`] over HTTP.
///
/// One instance is scoped to a single workspace credential; the underlying
/// `reqwest::Client` is shared across workspaces and carries the configured
/// request timeout.
pub struct ProviderClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl ProviderClient {
    pub fn new(http: Client, config: &ProviderConfig, api_key: &str) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            api_key: api_key.to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        Ok(ensure_slash(&self.base_url).join(path)?)
    }
}

/// Makes sure a url has a trailing slash, so `Url::join` appends rather than
/// replaces the last path segment.
fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut new_url = url.clone();
        let mut path = new_url.path().to_string();
        path.push('/');
        new_url.set_path(&path);
        new_url
    }
}

/// Parse a provider list response, distinguishing "empty list" (valid) from
/// "not a list" (malformed, loud failure).
fn parse_list<T: serde::de::DeserializeOwned>(
    body: &str,
    operation: &'static str,
) -> Result<Vec<T>, ProviderError> {
    let value: Value = serde_json::from_str(body).map_err(|e| ProviderError::Malformed {
        operation,
        message: format!("invalid JSON: {e}"),
    })?;
    if !value.is_array() {
        return Err(ProviderError::Malformed {
            operation,
            message: format!("expected a JSON array, got {}", json_kind(&value)),
        });
    }
    serde_json::from_value(value).map_err(|e| ProviderError::Malformed {
        operation,
        message: e.to_string(),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl CallService for ProviderClient {
    async fn list_calls(&self, request: &ListCallsRequest) -> Result<Vec<Call>, ProviderError> {
        let url = self.endpoint("v2/list-calls")?;
        debug!(%url, cursor = ?request.pagination_key, "listing calls");

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        let body = response.text().await?;
        parse_list(&body, "list-calls")
    }

    async fn list_agents(&self) -> Result<Vec<AgentRecord>, ProviderError> {
        let url = self.endpoint("list-agents")?;
        debug!(%url, "listing agents");

        let response = self.http.get(url).bearer_auth(&self.api_key).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        let body = response.text().await?;
        parse_list(&body, "list-agents")
    }
}

/// Page through the provider's list-calls operation until exhaustion and
/// return the full normalized result set.
///
/// Pages arrive newest-first. Each request carries the previous page's last
/// `call_id` as cursor; a page shorter than `page_size` terminates the loop.
/// `page_delay` is slept between successive requests — never after the final
/// page — to stay under the provider rate limit. Any page failure aborts the
/// remaining pagination and propagates.
pub async fn fetch_all_calls(
    service: &dyn CallService,
    criteria: Option<FilterCriteria>,
    page_size: u32,
    page_delay: Duration,
) -> Result<Vec<Call>, ProviderError> {
    let mut all_calls = Vec::new();
    let mut pagination_key: Option<String> = None;

    loop {
        let request = ListCallsRequest {
            filter_criteria: criteria.clone(),
            sort_order: Some(SortOrder::Descending),
            limit: Some(page_size),
            pagination_key: pagination_key.clone(),
        };

        let page = service.list_calls(&request).await?;
        let last_page = (page.len() as u32) < page_size;
        pagination_key = page.last().map(|call| call.call_id.clone());

        all_calls.extend(page.into_iter().map(Call::normalize));
        debug!(total = all_calls.len(), "accumulated call page");

        if last_page {
            break;
        }
        tokio::time::sleep(page_delay).await;
    }

    Ok(all_calls)
}

/// Fetch the workspace's agents, swallowing every failure into an empty set.
///
/// The dashboard must still render calls when agent listing is down (rate
/// limits on this endpoint are common), so the failure is logged and
/// recovered here rather than surfaced.
pub async fn fetch_agents(service: &dyn CallService) -> Vec<Agent> {
    match service.list_agents().await {
        Ok(records) => records.into_iter().map(AgentRecord::into_agent).collect(),
        Err(error) => {
            warn!(%error, "agent listing failed; continuing with an empty agent set");
            Vec::new()
        }
    }
}
