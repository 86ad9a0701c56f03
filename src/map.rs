//! Interactive Leaflet map with one toggleable layer per traffic class.

use crate::config::MapOptions;
use crate::model::{FlaggedReport, ReportTable};
use anyhow::{Context, Result};
use log::info;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::fs;
use std::path::Path;

pub static DEFAULT_ZOOM: u8 = 5;

/// Rows split by flag. A row flagged both ways appears in both anomaly layers.
#[derive(Debug)]
pub struct MapLayers<'a> {
    pub normal: Vec<&'a FlaggedReport>,
    pub gaps: Vec<&'a FlaggedReport>,
    pub spoofing: Vec<&'a FlaggedReport>,
}

fn drawable(table: &ReportTable<FlaggedReport>) -> impl Iterator<Item = &FlaggedReport> {
    table.rows.iter().filter(|r| r.report.position().is_some())
}

/// Rows without a usable position are left out. Normal traffic is capped at
/// `options.normal_traffic_cap` by a seeded sample that keeps table order.
pub fn partition_layers<'a>(
    table: &'a ReportTable<FlaggedReport>,
    options: &MapOptions,
) -> MapLayers<'a> {
    let mut normal: Vec<&FlaggedReport> = drawable(table).filter(|r| r.is_normal()).collect();
    if normal.len() > options.normal_traffic_cap {
        let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
        let mut picked =
            rand::seq::index::sample(&mut rng, normal.len(), options.normal_traffic_cap).into_vec();
        picked.sort_unstable();
        normal = picked.into_iter().map(|i| normal[i]).collect();
    }

    MapLayers {
        normal,
        gaps: drawable(table).filter(|r| r.is_gap_anomaly).collect(),
        spoofing: drawable(table).filter(|r| r.is_spoofing).collect(),
    }
}

#[derive(Debug, Serialize)]
struct MapPoint<'a> {
    lat: f64,
    lon: f64,
    mmsi: u64,
    name: Option<&'a str>,
    navstatus: Option<&'a str>,
    sog: Option<f64>,
}

fn points<'a>(rows: &[&'a FlaggedReport]) -> Vec<MapPoint<'a>> {
    rows.iter()
        .filter_map(|row| {
            let report = &row.report;
            let (lat, lon) = report.position()?;
            Some(MapPoint {
                lat,
                lon,
                mmsi: report.mmsi,
                name: report.name.as_deref(),
                navstatus: report.navstatus.as_deref(),
                sog: report.sog.filter(|v| v.is_finite()),
            })
        })
        .collect()
}

/// JSON safe to inline in a `<script>` element.
fn script_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

/// Mean of all usable positions, `(0, 0)` when there is none.
pub fn center(table: &ReportTable<FlaggedReport>) -> (f64, f64) {
    let (mut lat, mut lon, mut n) = (0.0, 0.0, 0usize);
    for (la, lo) in table.rows.iter().filter_map(|r| r.report.position()) {
        lat += la;
        lon += lo;
        n += 1;
    }
    if n == 0 {
        return (0.0, 0.0);
    }
    (lat / n as f64, lon / n as f64)
}

pub fn render_map(table: &ReportTable<FlaggedReport>, options: &MapOptions) -> Result<String> {
    let layers = partition_layers(table, options);
    info!("map: adding {} normal traffic points", layers.normal.len());
    info!("map: adding {} gap anomalies", layers.gaps.len());
    info!("map: adding {} spoofing anomalies", layers.spoofing.len());

    let (lat, lon) = center(table);
    Ok(TEMPLATE
        .replace("{{CENTER}}", &format!("[{}, {}]", lat, lon))
        .replace("{{ZOOM}}", &DEFAULT_ZOOM.to_string())
        .replace("{{NORMAL}}", &script_json(&points(&layers.normal))?)
        .replace("{{GAPS}}", &script_json(&points(&layers.gaps))?)
        .replace("{{SPOOFING}}", &script_json(&points(&layers.spoofing))?))
}

pub fn generate_map(
    table: &ReportTable<FlaggedReport>,
    path: &Path,
    options: &MapOptions,
) -> Result<()> {
    info!("generating interactive map");
    let html = render_map(table, options)?;
    fs::write(path, html).with_context(|| format!("failed to write map {}", path.display()))?;
    info!("map saved to {}", path.display());
    Ok(())
}

static TEMPLATE: &str = r##"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Maritime intelligence map</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<link rel="stylesheet" href="https://unpkg.com/leaflet.markercluster@1.5.3/dist/MarkerCluster.css">
<link rel="stylesheet"
  href="https://unpkg.com/leaflet.markercluster@1.5.3/dist/MarkerCluster.Default.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<script src="https://unpkg.com/leaflet.markercluster@1.5.3/dist/leaflet.markercluster.js"></script>
<style>html, body, #map { width: 100%; height: 100%; margin: 0; padding: 0; }</style>
</head>
<body>
<div id="map"></div>
<script>
var normalTraffic = {{NORMAL}};
var gapAnomalies = {{GAPS}};
var spoofingAnomalies = {{SPOOFING}};

function esc(v) {
  return String(v === null || v === undefined ? "" : v).replace(/[&<>"']/g, function (c) {
    return { "&": "&amp;", "<": "&lt;", ">": "&gt;", '"': "&quot;", "'": "&#39;" }[c];
  });
}

var map = L.map("map", { center: {{CENTER}}, zoom: {{ZOOM}} });
L.tileLayer("https://{s}.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}{r}.png", {
  attribution: "&copy; OpenStreetMap contributors &copy; CARTO",
  subdomains: "abcd",
  maxZoom: 20
}).addTo(map);

var normal = L.markerClusterGroup({ chunkedLoading: true });
normalTraffic.forEach(function (p) {
  normal.addLayer(L.circleMarker([p.lat, p.lon], { radius: 2, color: "#3388ff", weight: 1 })
    .bindPopup("MMSI: " + esc(p.mmsi) + "<br>Name: " + esc(p.name)
      + "<br>Status: " + esc(p.navstatus) + "<br>Speed: " + esc(p.sog) + " kn"));
});

var gaps = L.layerGroup();
gapAnomalies.forEach(function (p) {
  L.circleMarker([p.lat, p.lon], { radius: 3, color: "red", fill: true, fillOpacity: 0.6 })
    .bindPopup("<b>GOING DARK</b><br>MMSI: " + esc(p.mmsi) + "<br>Name: " + esc(p.name))
    .addTo(gaps);
});

var spoofing = L.layerGroup();
spoofingAnomalies.forEach(function (p) {
  L.circleMarker([p.lat, p.lon], { radius: 6, color: "orange", fill: true, fillOpacity: 0.9 })
    .bindPopup("<b>SPOOFING ALERT</b><br>MMSI: " + esc(p.mmsi) + "<br>Name: " + esc(p.name)
      + "<br>Claimed: " + esc(p.navstatus) + "<br>Speed: " + esc(p.sog) + " kn")
    .addTo(spoofing);
});

normal.addTo(map);
gaps.addTo(map);
spoofing.addTo(map);
L.control.layers(null, {
  "Normal Traffic (Blue)": normal,
  "Gap Anomalies (Red)": gaps,
  "Spoofing Alerts (Orange)": spoofing
}, { collapsed: false }).addTo(map);
</script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::epoch_to_timestamp;
    use crate::model::PositionReport;

    fn flagged(mmsi: u64, lat: Option<f64>, gap: bool, spoof: bool) -> FlaggedReport {
        FlaggedReport {
            report: PositionReport {
                mmsi,
                timeoffix: 0,
                timestamp: epoch_to_timestamp(0).unwrap(),
                navstatus: Some("Moored".to_string()),
                sog: Some(4.0),
                latitude: lat,
                longitude: Some(10.0),
                name: Some("</script><b>X</b>".to_string()),
                callsign: None,
            },
            dt_seconds: Some(1),
            is_gap_anomaly: gap,
            is_spoofing: spoof,
        }
    }

    fn table(rows: Vec<FlaggedReport>) -> ReportTable<FlaggedReport> {
        ReportTable {
            columns: vec![],
            rows,
        }
    }

    #[test]
    fn test_partition_by_flag() {
        let t = table(vec![
            flagged(1, Some(50.0), false, false),
            flagged(2, Some(51.0), true, false),
            flagged(3, Some(52.0), false, true),
            flagged(4, Some(53.0), true, true),
            flagged(5, None, true, true),
        ]);
        let layers = partition_layers(&t, &MapOptions::default());
        let ids = |rows: &[&FlaggedReport]| rows.iter().map(|r| r.report.mmsi).collect::<Vec<_>>();
        assert_eq!(ids(&layers.normal), vec![1]);
        assert_eq!(ids(&layers.gaps), vec![2, 4]);
        assert_eq!(ids(&layers.spoofing), vec![3, 4]);
    }

    #[test]
    fn test_normal_traffic_is_capped_and_reproducible() {
        let t = table((0..50).map(|i| flagged(i, Some(50.0), false, false)).collect());
        let options = MapOptions {
            normal_traffic_cap: 10,
            seed: 42,
        };
        let first = partition_layers(&t, &options);
        let second = partition_layers(&t, &options);
        assert_eq!(first.normal.len(), 10);
        let ids: Vec<u64> = first.normal.iter().map(|r| r.report.mmsi).collect();
        let again: Vec<u64> = second.normal.iter().map(|r| r.report.mmsi).collect();
        assert_eq!(ids, again);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_center_ignores_missing_positions() {
        let t = table(vec![
            flagged(1, Some(50.0), false, false),
            flagged(2, Some(52.0), false, false),
            flagged(3, None, false, false),
        ]);
        assert_eq!(center(&t), (51.0, 10.0));
        assert_eq!(center(&table(vec![])), (0.0, 0.0));
    }

    #[test]
    fn test_render_map() {
        let t = table(vec![flagged(7, Some(50.0), false, true)]);
        let html = render_map(&t, &MapOptions::default()).unwrap();
        assert!(html.contains("dark_all"));
        assert!(html.contains("Normal Traffic (Blue)"));
        assert!(html.contains("Gap Anomalies (Red)"));
        assert!(html.contains("Spoofing Alerts (Orange)"));
        assert!(html.contains("\"mmsi\":7"));
        assert!(html.contains("center: [50, 10]"));
        assert!(!html.contains("{{"));
        // vessel names must not close the data script early
        assert_eq!(html.matches("</script>").count(), 3);
    }

    #[test]
    fn test_generate_map_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.html");
        generate_map(&table(vec![]), &path, &MapOptions::default()).unwrap();
        let html = fs::read_to_string(&path).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("var normalTraffic = [];"));
    }
}
