use anyhow::{anyhow, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

pub static DEFAULT_INPUT: &str = "data/raw/AIS_UNACORN_Seatracks_past12-hours.csv";
pub static DEFAULT_OUTPUT_DIR: &str = "outputs";

/// A silence longer than this (4 hours) counts as going dark.
pub static GAP_THRESHOLD_SECONDS: i64 = 14_400;
/// A vessel declared stationary must not be faster than this.
pub static SPOOFING_SPEED_KNOTS: f64 = 3.0;
/// Lowercase keywords of a declared stationary navigation status.
pub static STATIONARY_STATUSES: [&str; 2] = ["anchored", "moored"];

pub static NORMAL_TRAFFIC_CAP: usize = 10_000;
pub static SAMPLE_SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub gap_seconds: i64,
    pub spoofing_speed_knots: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            gap_seconds: GAP_THRESHOLD_SECONDS,
            spoofing_speed_knots: SPOOFING_SPEED_KNOTS,
        }
    }
}

/// What happens to the first report of every vessel, which has no gap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FirstReportPolicy {
    /// Removed after flagging, spoofing hits on those rows included.
    #[default]
    Drop,
    /// Kept with an undefined gap. Spoofing is still reported for them.
    Keep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapOptions {
    pub normal_traffic_cap: usize,
    pub seed: u64,
}

impl Default for MapOptions {
    fn default() -> Self {
        MapOptions {
            normal_traffic_cap: NORMAL_TRAFFIC_CAP,
            seed: SAMPLE_SEED,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub paths: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub thresholds: Thresholds,
    pub first_report_policy: FirstReportPolicy,
    pub map: MapOptions,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            paths: vec![PathBuf::from(DEFAULT_INPUT)],
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            thresholds: Thresholds::default(),
            first_report_policy: FirstReportPolicy::default(),
            map: MapOptions::default(),
        }
    }
}

pub fn command() -> Command {
    Command::new("dark-fleet")
        .author("mys")
        .version("0.1")
        .about("flag AIS vessels going dark or spoofing a stationary status [csv]")
        .arg(
            Arg::new("paths")
                .short('f')
                .long("file-path")
                .action(ArgAction::Append)
                .value_parser(value_parser!(PathBuf))
                .default_value(DEFAULT_INPUT)
                .help("AIS position log to analyse"),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_parser(value_parser!(PathBuf))
                .default_value(DEFAULT_OUTPUT_DIR)
                .help("directory for the report and the map"),
        )
        .arg(
            Arg::new("gap-threshold")
                .long("gap-threshold")
                .value_parser(value_parser!(i64).range(0..))
                .default_value("14400")
                .help("seconds of silence flagged as going dark"),
        )
        .arg(
            Arg::new("speed-threshold")
                .long("speed-threshold")
                .value_parser(value_parser!(f64))
                .default_value("3.0")
                .help("knots above which an anchored/moored vessel is spoofing"),
        )
        .arg(
            Arg::new("keep-first-reports")
                .long("keep-first-reports")
                .action(ArgAction::SetTrue)
                .help("keep each vessel's first report instead of dropping it"),
        )
        .arg(
            Arg::new("normal-cap")
                .long("normal-cap")
                .value_parser(value_parser!(usize))
                .default_value("10000")
                .help("maximum normal traffic points drawn on the map"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_parser(value_parser!(u64))
                .default_value("42")
                .help("seed for sampling normal traffic"),
        )
}

impl Config {
    pub fn from_matches(matches: &ArgMatches) -> Result<Config> {
        let paths = matches
            .get_many::<PathBuf>("paths")
            .unwrap_or_default()
            .cloned()
            .collect::<Vec<PathBuf>>();

        let output_dir = required::<PathBuf>(matches, "output-dir")?;
        let speed = required::<f64>(matches, "speed-threshold")?;
        if !speed.is_finite() {
            return Err(anyhow!("speed threshold must be a finite number, got {}", speed));
        }

        let first_report_policy = if matches.get_flag("keep-first-reports") {
            FirstReportPolicy::Keep
        } else {
            FirstReportPolicy::Drop
        };

        Ok(Config {
            paths,
            output_dir,
            thresholds: Thresholds {
                gap_seconds: required::<i64>(matches, "gap-threshold")?,
                spoofing_speed_knots: speed,
            },
            first_report_policy,
            map: MapOptions {
                normal_traffic_cap: required::<usize>(matches, "normal-cap")?,
                seed: required::<u64>(matches, "seed")?,
            },
        })
    }
}

fn required<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> Result<T> {
    matches
        .get_one::<T>(id)
        .cloned()
        .ok_or_else(|| anyhow!("missing value for --{}", id))
}
