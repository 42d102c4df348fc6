//! Billing-ready CSV export.
//!
//! Two documented column sets exist: the full billing detail used by finance
//! (per-call cost and duration metrics at 5 decimal places) and the
//! case-summary variant used for case-status reporting (minimum-increment
//! billing figures at 3 decimal places). Row order follows the input call
//! order, identifiers are stripped of their wire prefixes, and every field
//! is scrubbed of commas so the output reads back through any plain
//! comma-delimited parser.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::billing::BillingPolicy;
use crate::filters::CallFilter;
use crate::provider::types::Call;

/// Placeholder for absent case/metadata-derived values.
const NOT_AVAILABLE: &str = "N/A";

const FULL_HEADER: [&str; 17] = [
    "Call ID",
    "Agent ID",
    "Start Date",
    "Start Time",
    "From Number",
    "To Number",
    "Duration (Seconds)",
    "Duration (Minutes)",
    "Status",
    "Call Type",
    "Post Call Status",
    "AI Cost per Minute (without Telephony)",
    "AI Cost per Second",
    "AI Cost",
    "Telephony Cost per Minute",
    "Telephony Cost",
    "Total Cost",
];

const CASE_SUMMARY_HEADER: [&str; 9] = [
    "Call ID",
    "Agent ID",
    "Start Date",
    "Start Time",
    "Post Call Status",
    "Rounded Minutes",
    "AI Cost",
    "Telephony Cost",
    "Total Cost",
];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV buffer error: {0}")]
    Buffer(String),

    #[error("generated CSV was not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Which of the two documented column sets to produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ExportVariant {
    #[default]
    Full,
    CaseSummary,
}

impl fmt::Display for ExportVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportVariant::Full => write!(f, "full"),
            ExportVariant::CaseSummary => write!(f, "case-summary"),
        }
    }
}

/// Format a decimal with a fixed number of decimal places, rounding half
/// away from zero.
fn fixed(value: Decimal, places: u32) -> String {
    let rounded = value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.prec$}", prec = places as usize)
}

/// Commas would break a plain comma-delimited reader; replace them.
fn scrub(value: &str) -> String {
    value.replace(',', " ")
}

fn strip_prefix_or<'a>(value: &'a str, prefix: &str) -> &'a str {
    value.strip_prefix(prefix).unwrap_or(value)
}

fn or_not_available(value: &str) -> String {
    if value.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        scrub(value)
    }
}

fn start_parts(timestamp_ms: i64) -> (String, String) {
    let when = Utc
        .timestamp_millis_opt(timestamp_ms)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH);
    (
        when.format("%m/%d/%Y").to_string(),
        when.format("%H:%M:%S").to_string(),
    )
}

/// Serialize a call set into one of the documented CSV layouts. Rows keep
/// the input order.
pub fn generate_csv(
    calls: &[Call],
    policy: &BillingPolicy,
    variant: ExportVariant,
) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    match variant {
        ExportVariant::Full => {
            writer.write_record(FULL_HEADER)?;
            for call in calls {
                writer.write_record(full_row(call, policy))?;
            }
        }
        ExportVariant::CaseSummary => {
            writer.write_record(CASE_SUMMARY_HEADER)?;
            for call in calls {
                writer.write_record(case_summary_row(call, policy))?;
            }
        }
    }

    writer.flush()?;
    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Buffer(e.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}

fn full_row(call: &Call, policy: &BillingPolicy) -> Vec<String> {
    let billing = policy.bill(call);
    let (start_date, start_time) = start_parts(call.start_timestamp);
    let post_call_status = call
        .call_analysis
        .post_call_status()
        .map(scrub)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    vec![
        scrub(strip_prefix_or(&call.call_id, "call_")),
        scrub(strip_prefix_or(&call.agent_id, "agent_")),
        start_date,
        start_time,
        or_not_available(&call.from_number),
        or_not_available(&call.to_number),
        fixed(billing.duration_seconds, 5),
        fixed(billing.duration_minutes, 5),
        scrub(&call.call_status),
        scrub(&call.call_type),
        post_call_status,
        fixed(billing.ai_cost_per_minute, 5),
        fixed(billing.ai_cost_per_second, 5),
        fixed(billing.agent_cost, 5),
        fixed(billing.telephony_rate_per_minute, 5),
        fixed(billing.telephony_cost, 5),
        fixed(billing.total_cost, 5),
    ]
}

fn case_summary_row(call: &Call, policy: &BillingPolicy) -> Vec<String> {
    let billing = policy.bill(call);
    let (start_date, start_time) = start_parts(call.start_timestamp);
    let post_call_status = call
        .call_analysis
        .post_call_status()
        .map(scrub)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    vec![
        scrub(strip_prefix_or(&call.call_id, "call_")),
        scrub(strip_prefix_or(&call.agent_id, "agent_")),
        start_date,
        start_time,
        post_call_status,
        fixed(Decimal::from(billing.billable_minutes), 3),
        fixed(billing.agent_cost, 3),
        fixed(billing.telephony_cost, 3),
        fixed(billing.total_cost, 3),
    ]
}

/// Export file name: workspace slug plus the fetched date range, or the
/// current date when the fetch was unbounded.
pub fn export_filename(workspace: &str, filter: &CallFilter, today: NaiveDate) -> String {
    let slug = slugify(workspace);
    match filter.date_range() {
        Some((start, end)) => format!(
            "{slug}-calls-{}-{}.csv",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        ),
        None => format!("{slug}-calls-{}.csv", today.format("%Y-%m-%d")),
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::types::{CallAnalysis, CallCost};
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_call() -> Call {
        Call {
            call_id: "call_abc123".into(),
            agent_id: "agent_77".into(),
            call_status: "ended".into(),
            call_type: "phone_call".into(),
            // 2025-03-01 09:30:05 UTC
            start_timestamp: 1_740_821_405_000,
            duration_ms: 90_000,
            from_number: "+15550001111".into(),
            to_number: "+15550002222".into(),
            direction: "outbound".into(),
            call_cost: Some(CallCost {
                combined_cost: 250.0,
                total_duration_seconds: 90.0,
                product_costs: Vec::new(),
            }),
            call_analysis: CallAnalysis {
                custom_analysis_data: [("post-call-status".to_string(), json!("resolved"))]
                    .into_iter()
                    .collect(),
                ..Default::default()
            },
            ..Default::default()
        }
        .normalize()
    }

    fn zero_duration_call() -> Call {
        Call {
            call_id: "call_zero".into(),
            agent_id: "agent_77".into(),
            duration_ms: 0,
            call_cost: Some(CallCost::default()),
            ..Default::default()
        }
        .normalize()
    }

    #[test]
    fn full_export_formats_costs_to_five_decimals() {
        let csv = generate_csv(
            &[sample_call()],
            &BillingPolicy::default(),
            ExportVariant::Full,
        )
        .unwrap();

        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), FULL_HEADER.join(","));
        let row: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(row.len(), FULL_HEADER.len());
        assert_eq!(row[0], "abc123");
        assert_eq!(row[1], "77");
        assert_eq!(row[6], "90.00000");
        assert_eq!(row[7], "1.50000");
        assert_eq!(row[10], "resolved");
        assert_eq!(row[11], "1.66667");
        assert_eq!(row[12], "0.02778");
        assert_eq!(row[13], "2.50000");
        assert_eq!(row[14], "0.14500");
        assert_eq!(row[15], "0.29000");
        assert_eq!(row[16], "2.79000");
    }

    #[test]
    fn zero_duration_case_summary_row_bills_the_minimum() {
        let csv = generate_csv(
            &[zero_duration_call()],
            &BillingPolicy::default(),
            ExportVariant::CaseSummary,
        )
        .unwrap();

        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), CASE_SUMMARY_HEADER.join(","));
        let row: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(row[4], "N/A");
        assert_eq!(row[5], "1.000");
        assert_eq!(row[6], "0.000");
        assert_eq!(row[7], "0.145");
        assert_eq!(row[8], "0.145");
    }

    #[test]
    fn missing_numbers_fall_back_to_not_available() {
        let mut call = sample_call();
        call.from_number = String::new();
        call.to_number = String::new();

        let csv = generate_csv(&[call], &BillingPolicy::default(), ExportVariant::Full).unwrap();
        let row: Vec<&str> = csv.lines().nth(1).unwrap().split(',').collect();
        assert_eq!(row[4], "N/A");
        assert_eq!(row[5], "N/A");
    }

    #[test]
    fn output_reads_back_through_a_plain_comma_parser() {
        let mut dirty = sample_call();
        dirty.call_status = "ended, abruptly".into();

        let csv = generate_csv(
            &[dirty, zero_duration_call()],
            &BillingPolicy::default(),
            ExportVariant::Full,
        )
        .unwrap();

        // No quoting should have been necessary anywhere
        assert!(!csv.contains('"'));
        for line in csv.lines() {
            assert_eq!(line.split(',').count(), FULL_HEADER.len());
        }

        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        assert_eq!(reader.records().count(), 2);
    }

    #[test]
    fn rows_keep_input_order() {
        let csv = generate_csv(
            &[zero_duration_call(), sample_call()],
            &BillingPolicy::default(),
            ExportVariant::CaseSummary,
        )
        .unwrap();

        let ids: Vec<&str> = csv
            .lines()
            .skip(1)
            .map(|line| line.split(',').next().unwrap())
            .collect();
        assert_eq!(ids, ["zero", "abc123"]);
    }

    #[test]
    fn filename_encodes_tenant_and_range_or_current_date() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();

        let bounded = CallFilter {
            start_date: Some(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()),
            end_date: Some(Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        assert_eq!(
            export_filename("Sheldon Law", &bounded, today),
            "sheldon-law-calls-2025-03-01-2025-03-02.csv"
        );

        assert_eq!(
            export_filename("Acme", &CallFilter::default(), today),
            "acme-calls-2025-03-05.csv"
        );
    }
}
