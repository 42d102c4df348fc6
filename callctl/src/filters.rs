//! Translation from dashboard filter state to provider filter criteria.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::provider::types::{FilterCriteria, ThresholdRange};

/// The filter state a dashboard user can express: a set of agents and an
/// optional date range over call start time. Doubles as the fetch request
/// body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CallFilter {
    /// Agent identifiers to include. Empty means "all agents".
    pub agent_ids: Vec<String>,
    /// Inclusive lower bound on call start time.
    pub start_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound on call start time.
    pub end_date: Option<DateTime<Utc>>,
}

impl CallFilter {
    /// Build the provider criteria for this filter, or `None` when nothing
    /// is filtered.
    ///
    /// An empty agent selection emits no `agent_id` key at all: the provider
    /// reads an empty array as "match no calls", which is never what a user
    /// clearing the agent picker means. A one-sided date range produces a
    /// one-sided threshold.
    pub fn criteria(&self) -> Option<FilterCriteria> {
        let mut criteria = FilterCriteria::default();

        if !self.agent_ids.is_empty() {
            criteria.agent_id = Some(self.agent_ids.clone());
        }
        if self.start_date.is_some() || self.end_date.is_some() {
            criteria.start_timestamp = Some(ThresholdRange {
                lower_threshold: self.start_date.map(|date| date.timestamp_millis()),
                upper_threshold: self.end_date.map(|date| date.timestamp_millis()),
            });
        }

        (criteria != FilterCriteria::default()).then_some(criteria)
    }

    /// Both range bounds, when the filter is fully bounded. Used for export
    /// file naming.
    pub fn date_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.start_date.zip(self.end_date)
    }
}
