use crate::model::{FlaggedReport, ReportTable, TIMESTAMP};
use anyhow::{Context, Result};
use log::info;
use std::cmp::Ordering;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Report columns, in output order. Only those present in the source are written.
pub static REPORT_COLUMNS: [&str; 8] = [
    "mmsi",
    "name",
    "callsign",
    "navstatus",
    "sog",
    TIMESTAMP,
    "latitude",
    "longitude",
];

pub static TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Spoofing-flagged rows, fastest first. Rows without a speed go last.
pub fn spoofing_targets(table: &ReportTable<FlaggedReport>) -> Vec<&FlaggedReport> {
    let mut targets: Vec<&FlaggedReport> = table.rows.iter().filter(|r| r.is_spoofing).collect();
    targets.sort_by(|a, b| match (a.report.sog, b.report.sog) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    targets
}

fn field(row: &FlaggedReport, column: &str) -> String {
    let report = &row.report;
    // `{:?}` keeps the fraction of whole numbers: 12.0, not 12.
    let opt = |v: &Option<f64>| v.map(|v| format!("{:?}", v)).unwrap_or_default();
    match column {
        "mmsi" => report.mmsi.to_string(),
        "name" => report.name.clone().unwrap_or_default(),
        "callsign" => report.callsign.clone().unwrap_or_default(),
        "navstatus" => report.navstatus.clone().unwrap_or_default(),
        "sog" => opt(&report.sog),
        "latitude" => opt(&report.latitude),
        "longitude" => opt(&report.longitude),
        TIMESTAMP => report.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        _ => String::new(),
    }
}

/// Writes the target list, header included. Returns the number of rows written.
pub fn write_report<W: Write>(table: &ReportTable<FlaggedReport>, writer: W) -> Result<usize> {
    let columns: Vec<&str> = REPORT_COLUMNS
        .iter()
        .copied()
        .filter(|c| table.has_column(c))
        .collect();

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&columns)?;

    let targets = spoofing_targets(table);
    for row in &targets {
        wtr.write_record(columns.iter().map(|c| field(row, c)))?;
    }
    wtr.flush()?;

    Ok(targets.len())
}

/// Exports spoofing targets to `path`. Nothing is written when no row qualifies.
pub fn export_report(table: &ReportTable<FlaggedReport>, path: &Path) -> Result<Option<usize>> {
    info!("exporting target list");
    if !table.rows.iter().any(|r| r.is_spoofing) {
        info!("no spoofing targets found, no report written");
        return Ok(None);
    }

    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let count = write_report(table, file)
        .with_context(|| format!("failed to write report {}", path.display()))?;

    info!("report with {} targets saved to {}", count, path.display());
    Ok(Some(count))
}
