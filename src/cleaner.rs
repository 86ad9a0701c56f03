use crate::model::{PositionReport, RawReport, ReportTable, TIMESTAMP};
use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDateTime};
use log::{info, warn};

/// Header of the index column left behind when a dataframe is written with its index.
fn is_artifact_column(name: &str) -> bool {
    name.is_empty() || name.starts_with("unnamed:")
}

pub fn epoch_to_timestamp(secs: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}

/// Drops the artifact index column and rows without a vessel key, decodes `timeoffix`
/// and orders rows by vessel then time.
///
/// Fails on the first `timeoffix` chrono cannot represent.
pub fn clean(table: ReportTable<RawReport>) -> Result<ReportTable<PositionReport>> {
    info!("starting data cleaning on {} reports", table.rows.len());

    let mut columns: Vec<String> = table
        .columns
        .into_iter()
        .filter(|c| !is_artifact_column(c) && c != TIMESTAMP)
        .collect();
    columns.push(TIMESTAMP.to_string());

    let total = table.rows.len();
    let mut rows = table
        .rows
        .into_iter()
        .filter_map(|raw| raw.mmsi.map(|mmsi| (mmsi, raw)))
        .map(|(mmsi, raw)| {
            let timestamp = epoch_to_timestamp(raw.timeoffix).ok_or_else(|| {
                anyhow!(
                    "timeoffix {} of vessel {} is out of range",
                    raw.timeoffix,
                    mmsi
                )
            })?;
            Ok(PositionReport::from_raw(raw, mmsi, timestamp))
        })
        .collect::<Result<Vec<PositionReport>>>()?;

    let unkeyed = total - rows.len();
    if unkeyed > 0 {
        warn!("dropped {} reports without a vessel mmsi", unkeyed);
    }

    // stable: equal (mmsi, timestamp) keep file order.
    rows.sort_by(|a, b| a.mmsi.cmp(&b.mmsi).then(a.timestamp.cmp(&b.timestamp)));

    info!("data cleaned and sorted by mmsi and time");
    Ok(ReportTable { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(mmsi: u64, timeoffix: i64) -> RawReport {
        RawReport {
            mmsi: Some(mmsi),
            timeoffix,
            navstatus: None,
            sog: None,
            latitude: None,
            longitude: None,
            name: None,
            callsign: None,
        }
    }

    fn table(columns: &[&str], rows: Vec<RawReport>) -> ReportTable<RawReport> {
        ReportTable {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    #[test]
    fn test_sorts_by_vessel_then_time() {
        let input = table(
            &["mmsi", "timeoffix"],
            vec![raw(2, 300), raw(1, 200), raw(2, 100), raw(1, 100), raw(3, 50)],
        );
        let cleaned = clean(input).unwrap();
        let order: Vec<(u64, i64)> = cleaned.rows.iter().map(|r| (r.mmsi, r.timeoffix)).collect();
        assert_eq!(order, vec![(1, 100), (1, 200), (2, 100), (2, 300), (3, 50)]);

        for pair in cleaned.rows.windows(2) {
            if pair[0].mmsi == pair[1].mmsi {
                assert!(pair[0].timestamp <= pair[1].timestamp);
            }
        }
    }

    #[test]
    fn test_decodes_epoch_seconds() {
        let cleaned = clean(table(&["mmsi", "timeoffix"], vec![raw(1, 1_700_000_000)])).unwrap();
        assert_eq!(
            cleaned.rows[0].timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            "2023-11-14 22:13:20"
        );
    }

    #[test]
    fn test_drops_artifact_columns() {
        let input = table(&["", "unnamed: 0", "mmsi", "timeoffix", "timestamp"], vec![]);
        let cleaned = clean(input).unwrap();
        assert_eq!(cleaned.columns, vec!["mmsi", "timeoffix", "timestamp"]);
    }

    #[test]
    fn test_drops_rows_without_vessel_key() {
        let mut unkeyed = raw(0, 150);
        unkeyed.mmsi = None;
        let cleaned = clean(table(
            &["mmsi", "timeoffix"],
            vec![raw(1, 100), unkeyed, raw(1, 200)],
        ))
        .unwrap();
        let order: Vec<(u64, i64)> = cleaned.rows.iter().map(|r| (r.mmsi, r.timeoffix)).collect();
        assert_eq!(order, vec![(1, 100), (1, 200)]);
    }

    #[test]
    fn test_out_of_range_timeoffix_fails() {
        let err = clean(table(&["mmsi", "timeoffix"], vec![raw(9, i64::MAX)])).unwrap_err();
        assert!(err.to_string().contains("vessel 9"));
    }
}
