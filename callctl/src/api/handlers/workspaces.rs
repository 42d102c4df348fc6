//! Workspace registry and agent listing handlers.

use axum::{
    extract::{Path, State},
    response::Json,
};
use tracing::debug;

use crate::{
    AppState,
    api::models::workspaces::{AgentResponse, WorkspaceResponse},
    errors::Error,
    provider::client::fetch_agents,
};

/// List configured workspaces
///
/// Returns the names of all workspaces in the registry. API keys are never
/// exposed.
#[utoipa::path(
    get,
    path = "/api/v1/workspaces",
    responses(
        (status = 200, description = "List of workspaces", body = [WorkspaceResponse]),
    ),
    tag = "workspaces",
)]
#[tracing::instrument(skip_all)]
pub async fn list_workspaces(State(state): State<AppState>) -> Json<Vec<WorkspaceResponse>> {
    let workspaces = state
        .config
        .workspaces
        .iter()
        .map(|workspace| WorkspaceResponse {
            name: workspace.name.clone(),
        })
        .collect();
    Json(workspaces)
}

/// List a workspace's agents
///
/// Agent listing failures are recovered as an empty list so the dashboard
/// can still display calls (with bare agent identifiers) while the provider
/// endpoint is unavailable.
#[utoipa::path(
    get,
    path = "/api/v1/workspaces/{name}/agents",
    params(("name" = String, Path, description = "Workspace name")),
    responses(
        (status = 200, description = "List of agents", body = [AgentResponse]),
        (status = 404, description = "Unknown workspace"),
    ),
    tag = "workspaces",
)]
#[tracing::instrument(skip_all, fields(workspace = %name))]
pub async fn list_agents(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<AgentResponse>>, Error> {
    let workspace = state.workspace(&name)?;
    let client = state.provider_client(workspace);

    let agents = fetch_agents(&client).await;
    debug!(count = agents.len(), "fetched agents");

    Ok(Json(agents.into_iter().map(AgentResponse::from).collect()))
}
