//! Call listing and summary API types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::billing::{BillingPolicy, CallBilling, FleetSummary};
use crate::export::ExportVariant;
use crate::provider::types::Call;
use crate::snapshot::CallSnapshot;

/// One dashboard table row: the normalized call plus its derived cost
/// metrics. Free-text analysis fields (summary) are not exposed here.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CallRow {
    pub call_id: String,
    pub agent_id: String,
    pub call_status: String,
    pub call_type: String,
    pub direction: String,
    /// Call start, epoch milliseconds
    pub start_timestamp: i64,
    pub duration_ms: i64,
    pub from_number: String,
    pub to_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disconnection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_call_status: Option<String>,
    pub billing: CallBilling,
}

impl CallRow {
    pub fn from_call(call: &Call, policy: &BillingPolicy) -> Self {
        Self {
            call_id: call.call_id.clone(),
            agent_id: call.agent_id.clone(),
            call_status: call.call_status.clone(),
            call_type: call.call_type.clone(),
            direction: call.direction.clone(),
            start_timestamp: call.start_timestamp,
            duration_ms: call.duration_ms,
            from_number: call.from_number.clone(),
            to_number: call.to_number.clone(),
            disconnection_reason: call.disconnection_reason.clone(),
            post_call_status: call
                .call_analysis
                .post_call_status()
                .map(|status| status.to_string()),
            billing: policy.bill(call),
        }
    }
}

/// Metadata and fleet aggregates of the currently installed snapshot.
/// Returned by both the fetch operation and the summary endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SnapshotSummaryResponse {
    pub workspace: String,
    /// Fetch generation the snapshot was installed under
    pub generation: u64,
    pub fetched_at: DateTime<Utc>,
    pub total_calls: u64,
    pub summary: FleetSummary,
}

impl From<&CallSnapshot> for SnapshotSummaryResponse {
    fn from(snapshot: &CallSnapshot) -> Self {
        Self {
            workspace: snapshot.workspace.clone(),
            generation: snapshot.generation,
            fetched_at: snapshot.fetched_at,
            total_calls: snapshot.calls.len() as u64,
            summary: snapshot.summary.clone(),
        }
    }
}

/// Query parameters for the CSV export endpoint.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ExportQuery {
    /// Column set to produce (default: full billing detail)
    #[serde(default)]
    pub variant: ExportVariant,
}
