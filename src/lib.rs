pub mod cleaner;
pub mod config;
pub mod export;
pub mod features;
pub mod map;
pub mod model;
pub mod summary;

pub use config::{Config, FirstReportPolicy, MapOptions, Thresholds};
pub use model::{FlaggedReport, PositionReport, RawReport, ReportTable};
pub use summary::Summary;

use anyhow::{bail, Context, Result};
use log::{error, info};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

pub static REPORT_FILE: &str = "suspicious_targets_report.csv";
pub static MAP_FILE: &str = "marint_intelligence_map.html";

pub fn get_arg() -> Result<Config> {
    let matches = config::command().get_matches();
    Config::from_matches(&matches)
}

pub fn run(config: Config) -> Result<()> {
    info!("config is {:?}", config);

    let dirs = output_dirs(&config);
    let ret: Result<Vec<Summary>> = config
        .paths
        .par_iter()
        .zip(dirs.par_iter())
        .map(|(path, dir)| process_file(path, &config, dir))
        .collect();

    ret.map(|_| ())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string())
}

/// Output directory of every input, in `config.paths` order: the configured one,
/// or a per-file subdirectory when several logs are processed in one run.
/// Inputs sharing a file stem get their 1-based position as a prefix.
pub fn output_dirs(config: &Config) -> Vec<PathBuf> {
    if config.paths.len() <= 1 {
        return vec![config.output_dir.clone(); config.paths.len()];
    }

    let stems: Vec<String> = config.paths.iter().map(|p| file_stem(p)).collect();
    stems
        .iter()
        .enumerate()
        .map(|(i, stem)| {
            let shared = stems.iter().filter(|s| *s == stem).count() > 1;
            if shared {
                config.output_dir.join(format!("{}-{}", i + 1, stem))
            } else {
                config.output_dir.join(stem)
            }
        })
        .collect()
}

/// Runs the whole pipeline on one AIS log: load, clean, flag, summarize,
/// then write the target report and the map into `output_dir`.
pub fn process_file(path: &Path, config: &Config, output_dir: &Path) -> Result<Summary> {
    if !path.is_file() {
        error!("data file not found at {}", path.display());
        bail!("data file not found: {}", path.display());
    }

    info!("loading data from {}", path.display());
    let raw = model::load(path)?;
    let cleaned = cleaner::clean(raw)?;
    let table =
        features::engineer_features(cleaned, &config.thresholds, config.first_report_policy);

    let summary = summary::summarize(&table);
    println!("{}\n{}", path.display(), summary);

    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    export::export_report(&table, &output_dir.join(REPORT_FILE))?;
    map::generate_map(&table, &output_dir.join(MAP_FILE), &config.map)?;

    Ok(summary)
}
