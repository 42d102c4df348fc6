//! Call fetch, listing, summary, and export handlers.
//!
//! The fetch handler runs the whole pipeline — paginate through the
//! provider, normalize, aggregate — and installs the result as the
//! workspace's snapshot. The remaining handlers serve from that snapshot
//! without touching the provider, so pagination and export are instant and a
//! billing export always matches the set the user inspected.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use tracing::{debug, info};

use crate::{
    AppState,
    api::models::calls::{CallRow, ExportQuery, SnapshotSummaryResponse},
    api::models::pagination::{PaginatedResponse, Pagination},
    errors::Error,
    export::{export_filename, generate_csv},
    filters::CallFilter,
    provider::client::fetch_all_calls,
    snapshot::CallSnapshot,
};

/// Fetch calls from the provider
///
/// Pages through the provider's list endpoint until exhaustion, respecting
/// its rate limit with a fixed inter-page delay, then installs the
/// normalized result set as the workspace's snapshot. Of two concurrent
/// fetches the later-started one wins; a failed fetch leaves the previous
/// snapshot intact.
#[utoipa::path(
    post,
    path = "/api/v1/workspaces/{name}/calls/fetch",
    params(("name" = String, Path, description = "Workspace name")),
    request_body = CallFilter,
    responses(
        (status = 200, description = "Snapshot installed", body = SnapshotSummaryResponse),
        (status = 404, description = "Unknown workspace"),
        (status = 502, description = "Provider fetch failed"),
    ),
    tag = "calls",
)]
#[tracing::instrument(skip_all, fields(workspace = %name))]
pub async fn fetch_calls(
    Path(name): Path<String>,
    State(state): State<AppState>,
    Json(filter): Json<CallFilter>,
) -> Result<Json<SnapshotSummaryResponse>, Error> {
    let workspace = state.workspace(&name)?;
    let client = state.provider_client(workspace);

    let generation = state.snapshots.begin_fetch(&name);
    let calls = fetch_all_calls(
        &client,
        filter.criteria(),
        state.config.provider.page_size,
        state.config.provider.page_delay,
    )
    .await?;
    info!(generation, total = calls.len(), "call fetch complete");

    let summary = state.config.billing.summarize(&calls);
    let installed = state.snapshots.install(CallSnapshot {
        workspace: name.clone(),
        generation,
        fetched_at: Utc::now(),
        filter,
        calls,
        summary,
    });
    if !installed {
        debug!(generation, "discarding stale fetch result");
    }

    // Either our snapshot or a newer one is guaranteed to be installed
    let snapshot = state
        .snapshots
        .get(&name)
        .ok_or_else(|| Error::SnapshotMissing { workspace: name })?;
    Ok(Json(SnapshotSummaryResponse::from(snapshot.as_ref())))
}

/// List calls from the snapshot
///
/// Pages through the already-fetched set; rows carry per-call derived cost
/// metrics under the configured billing policy.
#[utoipa::path(
    get,
    path = "/api/v1/workspaces/{name}/calls",
    params(("name" = String, Path, description = "Workspace name"), Pagination),
    responses(
        (status = 200, description = "One page of call rows"),
        (status = 404, description = "Unknown workspace or nothing fetched yet"),
    ),
    tag = "calls",
)]
#[tracing::instrument(skip_all, fields(workspace = %name))]
pub async fn list_calls(
    Path(name): Path<String>,
    Query(pagination): Query<Pagination>,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<CallRow>>, Error> {
    state.workspace(&name)?;
    let snapshot = state
        .snapshots
        .get(&name)
        .ok_or_else(|| Error::SnapshotMissing { workspace: name })?;

    let (start, end) = pagination.window(snapshot.calls.len());
    let rows = snapshot.calls[start..end]
        .iter()
        .map(|call| CallRow::from_call(call, &state.config.billing))
        .collect();

    Ok(Json(PaginatedResponse::new(
        rows,
        snapshot.calls.len() as i64,
        &pagination,
    )))
}

/// Fleet summary of the snapshot
#[utoipa::path(
    get,
    path = "/api/v1/workspaces/{name}/calls/summary",
    params(("name" = String, Path, description = "Workspace name")),
    responses(
        (status = 200, description = "Fleet aggregates", body = SnapshotSummaryResponse),
        (status = 404, description = "Unknown workspace or nothing fetched yet"),
    ),
    tag = "calls",
)]
#[tracing::instrument(skip_all, fields(workspace = %name))]
pub async fn call_summary(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SnapshotSummaryResponse>, Error> {
    state.workspace(&name)?;
    let snapshot = state
        .snapshots
        .get(&name)
        .ok_or_else(|| Error::SnapshotMissing { workspace: name })?;

    Ok(Json(SnapshotSummaryResponse::from(snapshot.as_ref())))
}

/// Export the snapshot as CSV
///
/// Serializes the full fetched set (not just the visible page) in the
/// requested column variant. The download filename encodes the workspace and
/// the fetched date range, or the current date for an unbounded fetch.
#[utoipa::path(
    get,
    path = "/api/v1/workspaces/{name}/calls/export",
    params(("name" = String, Path, description = "Workspace name"), ExportQuery),
    responses(
        (status = 200, description = "CSV download", content_type = "text/csv"),
        (status = 404, description = "Unknown workspace or nothing fetched yet"),
    ),
    tag = "calls",
)]
#[tracing::instrument(skip_all, fields(workspace = %name))]
pub async fn export_calls(
    Path(name): Path<String>,
    Query(query): Query<ExportQuery>,
    State(state): State<AppState>,
) -> Result<Response, Error> {
    state.workspace(&name)?;
    let snapshot = state
        .snapshots
        .get(&name)
        .ok_or_else(|| Error::SnapshotMissing { workspace: name })?;

    let csv = generate_csv(&snapshot.calls, &state.config.billing, query.variant)?;
    let filename = export_filename(&snapshot.workspace, &snapshot.filter, Utc::now().date_naive());
    info!(rows = snapshot.calls.len(), variant = %query.variant, %filename, "exporting calls");

    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
    ];
    Ok((headers, csv).into_response())
}
