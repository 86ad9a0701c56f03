use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const TIMESTAMP: &str = "timestamp";
pub const DT_SECONDS: &str = "dt_seconds";
pub const IS_GAP_ANOMALY: &str = "is_gap_anomaly";
pub const IS_SPOOFING: &str = "is_spoofing";

fn deserialize_epoch_seconds<'de, D>(d: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(d)?;
    parse_epoch_seconds(&s)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid epoch seconds `{}`", s)))
}

fn deserialize_mmsi<'de, D>(d: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(d)?;
    Ok(parse_mmsi(&s))
}

/// A vessel key, written as an integer or an integral float (`219000123.0`).
/// Blank or non-numeric cells have no key.
pub fn parse_mmsi(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Ok(mmsi) = s.parse::<u64>() {
        return Some(mmsi);
    }
    let mmsi: f64 = s.parse().ok()?;
    if mmsi.is_finite() && mmsi >= 0.0 && mmsi.fract() == 0.0 && mmsi < u64::MAX as f64 {
        Some(mmsi as u64)
    } else {
        None
    }
}

/// Whole seconds since the Unix epoch. Fractional values are truncated.
pub fn parse_epoch_seconds(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<i64>() {
        return Some(secs);
    }
    let secs: f64 = s.parse().ok()?;
    if !secs.is_finite() || secs.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(secs.trunc() as i64)
}

// header names are lowercased before deserializing, see `read`.
// mmsi,timeoffix,navstatus,sog,latitude,longitude,name,callsign
// 219000123,1700000000,Under way using engine,11.2,57.12,10.98,NORD STAR,OXAB2
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawReport {
    /// `None` for rows without a usable vessel key; the cleaner drops them.
    #[serde(deserialize_with = "deserialize_mmsi")]
    pub mmsi: Option<u64>,
    #[serde(deserialize_with = "deserialize_epoch_seconds")]
    pub timeoffix: i64,
    #[serde(default)]
    pub navstatus: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub sog: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub callsign: Option<String>,
}

/// A report after cleaning: same fields plus the decoded UTC timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionReport {
    pub mmsi: u64,
    pub timeoffix: i64,
    pub timestamp: NaiveDateTime,
    pub navstatus: Option<String>,
    pub sog: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub name: Option<String>,
    pub callsign: Option<String>,
}

impl PositionReport {
    pub fn from_raw(raw: RawReport, mmsi: u64, timestamp: NaiveDateTime) -> Self {
        PositionReport {
            mmsi,
            timeoffix: raw.timeoffix,
            timestamp,
            navstatus: raw.navstatus,
            sog: raw.sog,
            latitude: raw.latitude,
            longitude: raw.longitude,
            name: raw.name,
            callsign: raw.callsign,
        }
    }

    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }
}

/// A cleaned report with the per-vessel gap and both anomaly flags.
#[derive(Debug, Clone, PartialEq)]
pub struct FlaggedReport {
    pub report: PositionReport,
    /// Seconds since the previous report of the same vessel. `None` on a vessel's first report.
    pub dt_seconds: Option<i64>,
    pub is_gap_anomaly: bool,
    pub is_spoofing: bool,
}

impl FlaggedReport {
    pub fn is_normal(&self) -> bool {
        !self.is_gap_anomaly && !self.is_spoofing
    }
}

/// Rows of one pipeline stage together with the column names the source exposed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable<R> {
    pub columns: Vec<String>,
    pub rows: Vec<R>,
}

impl<R> ReportTable<R> {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub fn load(path: &Path) -> Result<ReportTable<RawReport>> {
    let file =
        File::open(path).with_context(|| format!("failed to open file {}", path.display()))?;
    read(file).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn read<T: Read>(source: T) -> Result<ReportTable<RawReport>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers: csv::StringRecord = rdr.headers()?.iter().map(|h| h.to_lowercase()).collect();
    let columns = headers.iter().map(String::from).collect();
    rdr.set_headers(headers);

    let mut rows = Vec::new();
    for (i, result) in rdr.deserialize().enumerate() {
        // +2: one for the header, one for 1-based lines.
        let record: RawReport =
            result.with_context(|| format!("malformed report on line {}", i + 2))?;
        rows.push(record);
    }

    Ok(ReportTable { columns, rows })
}
