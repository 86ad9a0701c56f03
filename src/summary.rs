use crate::model::{FlaggedReport, ReportTable};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub total_ships: usize,
    pub gap_anomalies_detected: usize,
    pub spoofing_anomalies_detected: usize,
}

pub fn summarize(table: &ReportTable<FlaggedReport>) -> Summary {
    let vessels: HashSet<u64> = table.rows.iter().map(|r| r.report.mmsi).collect();
    Summary {
        total_ships: vessels.len(),
        gap_anomalies_detected: table.rows.iter().filter(|r| r.is_gap_anomaly).count(),
        spoofing_anomalies_detected: table.rows.iter().filter(|r| r.is_spoofing).count(),
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== intelligence summary ===")?;
        writeln!(f, "vessels tracked:   {}", self.total_ships)?;
        writeln!(f, "spoofing alerts:   {}", self.spoofing_anomalies_detected)?;
        write!(f, "going dark alerts: {}", self.gap_anomalies_detected)
    }
}
