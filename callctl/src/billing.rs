//! Cost derivation for calls and fleets.
//!
//! Telephony billing follows the **minimum-increment** policy: duration is
//! rounded up to whole minutes at a fixed per-minute rate, and a
//! zero-duration call (failed dial, instant hangup) still incurs one minimum
//! increment instead of costing nothing. The rate and the minimum charge are
//! configuration, not constants, because they have historically drifted
//! between deployments.
//!
//! All monetary arithmetic is `Decimal`, so fleet aggregation is exact and
//! the same input set produces the same totals in any order. Rounding
//! happens once, at the aggregate (3 decimal places for money, 2 for
//! minutes) — never per call — to avoid compounding rounding error.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::provider::types::Call;

const MS_PER_MINUTE: i64 = 60_000;

/// Telephony billing constants for one deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BillingPolicy {
    /// Price of one billable minute, in dollars.
    pub rate_per_minute: Decimal,
    /// Charge applied to a zero-duration call, in dollars.
    pub minimum_charge: Decimal,
}

impl Default for BillingPolicy {
    fn default() -> Self {
        Self {
            rate_per_minute: Decimal::new(145, 3),
            minimum_charge: Decimal::new(145, 3),
        }
    }
}

/// Derived cost metrics for a single call.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CallBilling {
    #[schema(value_type = String)]
    pub duration_seconds: Decimal,
    #[schema(value_type = String)]
    pub duration_minutes: Decimal,
    /// Duration rounded up to whole minutes; 1 for zero-duration calls.
    pub billable_minutes: u64,
    /// Provider-billed cost, in dollars.
    #[schema(value_type = String)]
    pub agent_cost: Decimal,
    #[schema(value_type = String)]
    pub ai_cost_per_minute: Decimal,
    #[schema(value_type = String)]
    pub ai_cost_per_second: Decimal,
    #[schema(value_type = String)]
    pub telephony_rate_per_minute: Decimal,
    #[schema(value_type = String)]
    pub telephony_cost: Decimal,
    #[schema(value_type = String)]
    pub total_cost: Decimal,
}

/// Fleet-level aggregates over one fetched call set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FleetSummary {
    pub total_calls: u64,
    /// Unrounded minute sum, rounded to 2 decimal places at the aggregate.
    #[schema(value_type = String)]
    pub total_minutes: Decimal,
    #[schema(value_type = String)]
    pub agent_cost: Decimal,
    #[schema(value_type = String)]
    pub telephony_cost: Decimal,
    #[schema(value_type = String)]
    pub total_cost: Decimal,
}

/// Lossy-input guard: NaN and infinities count as zero.
fn decimal_from_f64(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(3, RoundingStrategy::MidpointAwayFromZero)
}

impl BillingPolicy {
    /// Billable minutes for a call: duration rounded up to the next whole
    /// minute, with zero-duration calls billed one minimum increment.
    pub fn billable_minutes(&self, duration_ms: i64) -> u64 {
        if duration_ms <= 0 {
            return 1;
        }
        (duration_ms as u64).div_ceil(MS_PER_MINUTE as u64)
    }

    /// Telephony-side cost of a call in dollars. Zero-duration calls charge
    /// the fixed minimum rather than rate x minutes.
    pub fn telephony_cost(&self, duration_ms: i64) -> Decimal {
        if duration_ms <= 0 {
            return self.minimum_charge;
        }
        Decimal::from(self.billable_minutes(duration_ms)) * self.rate_per_minute
    }

    /// Provider-billed (agent-side) cost of a call in dollars.
    pub fn agent_cost(&self, call: &Call) -> Decimal {
        let cents = call
            .call_cost
            .as_ref()
            .map(|cost| cost.combined_cost)
            .unwrap_or_default();
        decimal_from_f64(cents) / Decimal::ONE_HUNDRED
    }

    /// Full per-call cost breakdown.
    pub fn bill(&self, call: &Call) -> CallBilling {
        let duration_seconds = Decimal::from(call.duration_ms.max(0)) / Decimal::ONE_THOUSAND;
        let duration_minutes = duration_seconds / Decimal::from(60);
        let agent_cost = self.agent_cost(call);
        let telephony_cost = self.telephony_cost(call.duration_ms);

        let ai_cost_per_minute = if duration_minutes > Decimal::ZERO {
            agent_cost / duration_minutes
        } else {
            Decimal::ZERO
        };
        let ai_cost_per_second = if duration_seconds > Decimal::ZERO {
            agent_cost / duration_seconds
        } else {
            Decimal::ZERO
        };

        CallBilling {
            duration_seconds,
            duration_minutes,
            billable_minutes: self.billable_minutes(call.duration_ms),
            agent_cost,
            ai_cost_per_minute,
            ai_cost_per_second,
            telephony_rate_per_minute: self.rate_per_minute,
            telephony_cost,
            total_cost: agent_cost + telephony_cost,
        }
    }

    /// Aggregate a call set into fleet totals.
    ///
    /// Minutes prefer the provider's own `total_duration_seconds`, falling
    /// back to `duration_ms` when the cost bundle is absent. The reduction is
    /// order-independent: totals are identical for any permutation of the
    /// input.
    pub fn summarize(&self, calls: &[Call]) -> FleetSummary {
        let mut total_minutes = Decimal::ZERO;
        let mut agent_cost = Decimal::ZERO;
        let mut telephony_cost = Decimal::ZERO;

        for call in calls {
            total_minutes += match &call.call_cost {
                Some(cost) => decimal_from_f64(cost.total_duration_seconds) / Decimal::from(60),
                None => Decimal::from(call.duration_ms.max(0)) / Decimal::from(MS_PER_MINUTE),
            };
            agent_cost += self.agent_cost(call);
            telephony_cost += self.telephony_cost(call.duration_ms);
        }

        FleetSummary {
            total_calls: calls.len() as u64,
            total_minutes: total_minutes
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            agent_cost: round_money(agent_cost),
            telephony_cost: round_money(telephony_cost),
            total_cost: round_money(agent_cost + telephony_cost),
        }
    }
}
