//! # callctl: Call Analytics & Billing Dashboard
//!
//! `callctl` is a self-hostable dashboard service for multi-tenant
//! conversational-AI telephony fleets. Staff pick a workspace (tenant), pull
//! its call records from the telephony provider's API, filter them by date
//! range and agent, page through the results with derived cost metrics, and
//! download a billing-ready CSV.
//!
//! ## Architecture
//!
//! The service is a thin [Axum](https://github.com/tokio-rs/axum) HTTP layer
//! over an in-memory pipeline; there is no database. A fetch request pages
//! through the provider's list endpoint sequentially ([`provider::client`]),
//! normalizes each record into the canonical call shape
//! ([`provider::types`]), computes fleet aggregates under the configured
//! billing policy ([`billing`]), and installs the result as the workspace's
//! generation-tagged snapshot ([`snapshot`]). Listing, summary, and CSV
//! export ([`export`]) all serve from that snapshot, so the export always
//! matches exactly the set the user inspected.
//!
//! Workspace credentials come from an immutable configuration table loaded
//! at startup ([`config`]); the active workspace is named in the request
//! path, never held in process state.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use callctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = callctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     callctl::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config)?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await
//! }
//! ```

pub mod api;
pub mod billing;
pub mod config;
pub mod errors;
pub mod export;
pub mod filters;
pub mod provider;
pub mod snapshot;
pub mod telemetry;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;
use config::WorkspaceConfig;
pub use errors::{Error, Result};
use provider::client::ProviderClient;
use snapshot::SnapshotStore;

/// Application state shared across all request handlers: the immutable
/// configuration (including the workspace registry), a shared HTTP client
/// carrying the provider timeout, and the per-workspace snapshot store.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub http: reqwest::Client,
    pub snapshots: Arc<SnapshotStore>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.provider.request_timeout)
            .build()?;
        Ok(Self {
            config,
            http,
            snapshots: Arc::new(SnapshotStore::new()),
        })
    }

    /// Resolve a workspace by name, failing fast before any network call.
    pub fn workspace(&self, name: &str) -> Result<&WorkspaceConfig> {
        self.config.workspace(name).ok_or_else(|| Error::NotFound {
            resource: "workspace".to_string(),
            id: name.to_string(),
        })
    }

    /// Provider client scoped to one workspace's credential.
    pub fn provider_client(&self, workspace: &WorkspaceConfig) -> ProviderClient {
        ProviderClient::new(self.http.clone(), &self.config.provider, &workspace.api_key)
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "callctl",
        description = "Call analytics and billing dashboard for conversational-AI telephony fleets"
    ),
    paths(
        api::handlers::workspaces::list_workspaces,
        api::handlers::workspaces::list_agents,
        api::handlers::calls::fetch_calls,
        api::handlers::calls::list_calls,
        api::handlers::calls::call_summary,
        api::handlers::calls::export_calls,
    ),
    components(schemas(
        api::models::workspaces::WorkspaceResponse,
        api::models::workspaces::AgentResponse,
        api::models::calls::CallRow,
        api::models::calls::SnapshotSummaryResponse,
        billing::CallBilling,
        billing::FleetSummary,
        export::ExportVariant,
        filters::CallFilter,
    )),
    tags(
        (name = "workspaces", description = "Workspace registry and agents"),
        (name = "calls", description = "Call fetching, listing, and export"),
    )
)]
struct ApiDoc;

/// Create CORS layer from config. A literal `"*"` origin allows any.
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let layer = if config.cors_allowed_origins.iter().any(|origin| origin == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_allowed_origins
            .iter()
            .map(|origin| origin.parse::<HeaderValue>())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };
    Ok(layer)
}

/// Assemble the service router: health check, versioned API, and OpenAPI
/// docs, with request tracing and CORS applied.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let cors_layer = create_cors_layer(&state.config)?;

    let api_routes = Router::new()
        .route("/workspaces", get(api::handlers::workspaces::list_workspaces))
        .route(
            "/workspaces/{name}/agents",
            get(api::handlers::workspaces::list_agents),
        )
        .route(
            "/workspaces/{name}/calls/fetch",
            post(api::handlers::calls::fetch_calls),
        )
        .route("/workspaces/{name}/calls", get(api::handlers::calls::list_calls))
        .route(
            "/workspaces/{name}/calls/summary",
            get(api::handlers::calls::call_summary),
        )
        .route(
            "/workspaces/{name}/calls/export",
            get(api::handlers::calls::export_calls),
        )
        .with_state(state);

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer);

    Ok(router)
}

/// The assembled service, ready to bind and serve.
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub fn new(config: Config) -> anyhow::Result<Self> {
        info!(
            workspaces = config.workspaces.len(),
            provider = %config.provider.base_url,
            "initializing call dashboard"
        );
        let state = AppState::new(config.clone())?;
        let router = build_router(state)?;
        Ok(Self { router, config })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Call dashboard listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use axum_test::TestServer;
    use serde_json::{Value, json};
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(provider_url: &str) -> Config {
        Config {
            provider: ProviderConfig {
                base_url: provider_url.parse().unwrap(),
                page_delay: Duration::ZERO,
                ..Default::default()
            },
            workspaces: vec![
                WorkspaceConfig {
                    name: "Acme".into(),
                    api_key: "key_acme".into(),
                },
                WorkspaceConfig {
                    name: "Globex".into(),
                    api_key: "key_globex".into(),
                },
            ],
            ..Default::default()
        }
    }

    fn test_server(provider_url: &str) -> TestServer {
        let state = AppState::new(test_config(provider_url)).unwrap();
        TestServer::new(build_router(state).unwrap()).expect("Failed to create test server")
    }

    #[tokio::test]
    async fn fetch_list_summary_export_flow() {
        let provider = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/list-calls"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "call_id": "call_a",
                    "agent_id": "agent_1",
                    "duration_ms": 90_000,
                    "call_cost": {"combined_cost": 250.0, "total_duration_seconds": 90.0}
                },
                {"call_id": "call_b", "duration_ms": 0}
            ])))
            .mount(&provider)
            .await;

        let server = test_server(&provider.uri());

        let fetch = server
            .post("/api/v1/workspaces/Acme/calls/fetch")
            .json(&json!({}))
            .await;
        fetch.assert_status_ok();
        let summary: Value = fetch.json();
        assert_eq!(summary["total_calls"], 2);
        assert_eq!(summary["generation"], 1);
        assert_eq!(summary["summary"]["total_cost"], "2.935");

        let page = server
            .get("/api/v1/workspaces/Acme/calls")
            .add_query_param("skip", 0)
            .add_query_param("limit", 1)
            .await;
        page.assert_status_ok();
        let page: Value = page.json();
        assert_eq!(page["total_count"], 2);
        assert_eq!(page["data"].as_array().unwrap().len(), 1);
        assert_eq!(page["data"][0]["call_id"], "call_a");
        assert_eq!(page["data"][0]["billing"]["billable_minutes"], 2);

        let summary = server.get("/api/v1/workspaces/Acme/calls/summary").await;
        summary.assert_status_ok();

        let export = server
            .get("/api/v1/workspaces/Acme/calls/export")
            .add_query_param("variant", "case-summary")
            .await;
        export.assert_status_ok();
        let disposition = export
            .headers()
            .get("content-disposition")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.contains("acme-calls-"), "{disposition}");
        let body = export.text();
        assert!(body.starts_with("Call ID,Agent ID,"));
        assert_eq!(body.lines().count(), 3);
    }

    #[tokio::test]
    async fn fetch_sends_filter_criteria_to_provider() {
        let provider = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/list-calls"))
            .and(body_partial_json(json!({
                "filter_criteria": {"agent_id": ["agent_1"]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&provider)
            .await;

        let server = test_server(&provider.uri());
        let fetch = server
            .post("/api/v1/workspaces/Acme/calls/fetch")
            .json(&json!({"agent_ids": ["agent_1"]}))
            .await;
        fetch.assert_status_ok();
        let summary: Value = fetch.json();
        assert_eq!(summary["total_calls"], 0);
    }

    #[tokio::test]
    async fn unknown_workspace_fails_fast() {
        let provider = MockServer::start().await;
        let server = test_server(&provider.uri());

        let response = server
            .post("/api/v1/workspaces/Initech/calls/fetch")
            .json(&json!({}))
            .await;
        response.assert_status_not_found();
        // Fail-fast: no provider request was made
        assert!(provider.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_before_any_fetch_is_not_found() {
        let provider = MockServer::start().await;
        let server = test_server(&provider.uri());

        let response = server.get("/api/v1/workspaces/Globex/calls").await;
        response.assert_status_not_found();
        assert!(response.text().contains("Globex"));
    }

    #[tokio::test]
    async fn provider_failure_surfaces_as_bad_gateway() {
        let provider = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/list-calls"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&provider)
            .await;

        let server = test_server(&provider.uri());
        let response = server
            .post("/api/v1/workspaces/Acme/calls/fetch")
            .json(&json!({}))
            .await;
        response.assert_status(axum::http::StatusCode::BAD_GATEWAY);

        // A failed fetch installs nothing
        let listing = server.get("/api/v1/workspaces/Acme/calls").await;
        listing.assert_status_not_found();
    }

    #[tokio::test]
    async fn agent_listing_degrades_to_empty_on_provider_failure() {
        let provider = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list-agents"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&provider)
            .await;

        let server = test_server(&provider.uri());
        let response = server.get("/api/v1/workspaces/Acme/agents").await;
        response.assert_status_ok();
        let agents: Value = response.json();
        assert_eq!(agents.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn healthz_responds() {
        let provider = MockServer::start().await;
        let server = test_server(&provider.uri());
        let response = server.get("/healthz").await;
        response.assert_status_ok();
        assert_eq!(response.text(), "OK");
    }
}
