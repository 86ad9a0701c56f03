//! Per-vessel reporting gaps and the two anomaly rules.
//!
//! Going dark: a vessel is silent for longer than the gap threshold.
//! Spoofing: a vessel declares itself anchored or moored while moving faster than
//! the speed threshold.

use crate::config::{FirstReportPolicy, Thresholds, STATIONARY_STATUSES};
use crate::model::{
    FlaggedReport, PositionReport, ReportTable, DT_SECONDS, IS_GAP_ANOMALY, IS_SPOOFING,
};
use chrono::NaiveDateTime;
use log::{debug, info};
use std::collections::BTreeMap;

pub fn is_gap_anomaly(dt_seconds: Option<i64>, thresholds: &Thresholds) -> bool {
    dt_seconds.map_or(false, |dt| dt > thresholds.gap_seconds)
}

/// Case-insensitive substring match of the declared status against the stationary keywords.
pub fn is_declared_stationary(navstatus: Option<&str>) -> bool {
    navstatus.map_or(false, |status| {
        let status = status.to_lowercase();
        STATIONARY_STATUSES.iter().any(|k| status.contains(k))
    })
}

pub fn is_spoofing(navstatus: Option<&str>, sog: Option<f64>, thresholds: &Thresholds) -> bool {
    is_declared_stationary(navstatus)
        && sog.map_or(false, |speed| speed > thresholds.spoofing_speed_knots)
}

/// Groups reports by vessel, ascending mmsi, keeping the incoming order inside each group.
pub fn partition_by_vessel(rows: Vec<PositionReport>) -> BTreeMap<u64, Vec<PositionReport>> {
    let mut vessels: BTreeMap<u64, Vec<PositionReport>> = BTreeMap::new();
    for row in rows {
        vessels.entry(row.mmsi).or_default().push(row);
    }
    vessels
}

/// Scans one vessel's time-ordered reports, pairing each with its predecessor.
fn scan_vessel(track: Vec<PositionReport>, thresholds: &Thresholds) -> Vec<FlaggedReport> {
    let mut previous: Option<NaiveDateTime> = None;
    track
        .into_iter()
        .map(|report| {
            let dt_seconds = previous.map(|prev| (report.timestamp - prev).num_seconds());
            previous = Some(report.timestamp);

            let is_gap_anomaly = is_gap_anomaly(dt_seconds, thresholds);
            let is_spoofing = is_spoofing(report.navstatus.as_deref(), report.sog, thresholds);
            FlaggedReport {
                report,
                dt_seconds,
                is_gap_anomaly,
                is_spoofing,
            }
        })
        .collect()
}

/// Expects a cleaned table (sorted by mmsi, then timestamp).
pub fn engineer_features(
    table: ReportTable<PositionReport>,
    thresholds: &Thresholds,
    policy: FirstReportPolicy,
) -> ReportTable<FlaggedReport> {
    info!(
        "engineering features: gap > {}s, stationary status with sog > {} kn",
        thresholds.gap_seconds, thresholds.spoofing_speed_knots
    );

    let mut columns = table.columns;
    for column in [DT_SECONDS, IS_GAP_ANOMALY, IS_SPOOFING] {
        if !columns.iter().any(|c| c == column) {
            columns.push(column.to_string());
        }
    }

    let vessels = partition_by_vessel(table.rows);
    let mut rows = Vec::new();
    let mut dropped = 0;
    for (mmsi, track) in vessels {
        let flagged = scan_vessel(track, thresholds);
        match policy {
            FirstReportPolicy::Drop => {
                for row in flagged {
                    if row.dt_seconds.is_some() {
                        rows.push(row);
                    } else {
                        debug!("dropping first report of vessel {}", mmsi);
                        dropped += 1;
                    }
                }
            }
            FirstReportPolicy::Keep => rows.extend(flagged),
        }
    }

    info!(
        "features engineered: {} reports kept, {} first reports dropped",
        rows.len(),
        dropped
    );
    ReportTable { columns, rows }
}
