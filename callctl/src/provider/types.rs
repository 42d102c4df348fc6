//! Wire schema for the conversational-AI telephony provider.
//!
//! Field names follow the provider's JSON schema byte-for-byte (`call_id`,
//! `start_timestamp`, `call_cost.combined_cost`, ...) so serialized filter
//! criteria and deserialized call records stay compatible with the remote
//! API. Timestamps are epoch milliseconds, durations are milliseconds, and
//! provider-reported costs are US cents.
//!
//! Every field is optional on the wire. Deserialization is deliberately
//! forgiving: absent or malformed nested bundles collapse to their defaults
//! instead of failing the whole record (only a malformed top-level record is
//! a hard deserialization error, which aborts the fetch). [`Call::normalize`]
//! then applies the documented default substitutions.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Default substitute for absent status-like string fields.
const UNKNOWN: &str = "unknown";

/// Deserialize a field to its default when the payload holds a value of the
/// wrong shape, rather than rejecting the record.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// A single call record as returned by the provider's list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Call {
    pub call_id: String,
    pub agent_id: String,
    pub call_status: String,
    pub call_type: String,
    /// Call start, epoch milliseconds.
    pub start_timestamp: i64,
    pub duration_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disconnection_reason: Option<String>,
    pub from_number: String,
    pub to_number: String,
    pub direction: String,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub latency: Option<CallLatency>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub call_cost: Option<CallCost>,
    #[serde(deserialize_with = "lenient")]
    pub call_analysis: CallAnalysis,
}

/// Per-stage latency percentile bundles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallLatency {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<LatencyMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e2e: Option<LatencyMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts: Option<LatencyMetrics>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyMetrics {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub min: f64,
    pub max: f64,
    pub num: u64,
    pub values: Vec<f64>,
}

/// Provider-reported cost bundle. `combined_cost` is in cents and may be
/// fractional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallCost {
    pub combined_cost: f64,
    pub total_duration_seconds: f64,
    pub product_costs: Vec<ProductCost>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductCost {
    pub product: String,
    pub cost: f64,
    pub unit_price: f64,
}

/// Post-call analysis bundle. `custom_analysis_data` is a free-form
/// extension map; the dashboard reads its `post-call-status` key for case
/// reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallAnalysis {
    pub in_voicemail: bool,
    pub call_summary: String,
    pub user_sentiment: String,
    pub call_successful: bool,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub custom_analysis_data: HashMap<String, Value>,
}

impl CallAnalysis {
    /// The case status recorded by post-call processing, if any.
    pub fn post_call_status(&self) -> Option<&str> {
        self.custom_analysis_data
            .get("post-call-status")
            .and_then(Value::as_str)
            .filter(|status| !status.is_empty())
    }
}

impl Call {
    /// Apply the canonical default substitutions: status-like strings become
    /// `"unknown"`, numeric fields clamp to zero, and sentiment falls back to
    /// `"unknown"`. Idempotent, and total over anything deserialization
    /// accepts.
    pub fn normalize(mut self) -> Call {
        for field in [
            &mut self.agent_id,
            &mut self.call_status,
            &mut self.call_type,
            &mut self.direction,
        ] {
            if field.is_empty() {
                *field = UNKNOWN.to_string();
            }
        }
        if self.call_analysis.user_sentiment.is_empty() {
            self.call_analysis.user_sentiment = UNKNOWN.to_string();
        }

        self.start_timestamp = self.start_timestamp.max(0);
        self.duration_ms = self.duration_ms.max(0);

        if let Some(cost) = &mut self.call_cost {
            // f64::max drops NaN in favor of the other operand
            cost.combined_cost = cost.combined_cost.max(0.0);
            cost.total_duration_seconds = cost.total_duration_seconds.max(0.0);
            for product in &mut cost.product_costs {
                product.cost = product.cost.max(0.0);
                product.unit_price = product.unit_price.max(0.0);
            }
        }

        self
    }
}

/// An agent record as returned by the provider's list endpoint. Older
/// provider schema revisions used `name` instead of `agent_name`; both are
/// accepted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentRecord {
    pub agent_id: String,
    pub agent_name: Option<String>,
    name: Option<String>,
}

/// A display-ready agent: identifier plus a name, synthesized from the
/// identifier prefix when the provider supplies none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    pub agent_id: String,
    pub name: String,
}

impl AgentRecord {
    pub fn into_agent(self) -> Agent {
        let agent_id = if self.agent_id.is_empty() {
            UNKNOWN.to_string()
        } else {
            self.agent_id
        };
        let name = self
            .agent_name
            .or(self.name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("Agent {}", agent_id.chars().take(8).collect::<String>()));
        Agent { agent_id, name }
    }
}

/// Inclusive lower/upper thresholds on a numeric call field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_threshold: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_threshold: Option<i64>,
}

/// Filter criteria accepted by the provider's list-calls operation.
///
/// Only `agent_id` and `start_timestamp` are driven by the dashboard; the
/// remaining fields are part of the provider contract and kept for
/// structural compatibility. Absent keys MUST be omitted from the payload
/// entirely — an empty `agent_id` array would read as "match no calls".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_status: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_voicemail: Option<Vec<bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disconnection_reason: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_number: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_number: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_type: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_sentiment: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_successful: Option<Vec<bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<ThresholdRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<ThresholdRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e2e_latency_p50: Option<ThresholdRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Request body for the provider's list-calls operation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListCallsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_criteria: Option<FilterCriteria>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination_key: Option<String>,
}
