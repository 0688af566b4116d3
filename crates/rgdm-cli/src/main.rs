//! Gravity model runs from the command line.
//!
//! # Usage
//!
//! ```bash
//! rgdm balance --config run.toml --output flows.csv
//! rgdm calibrate --config run.toml --output flows.csv --report report.json -v
//! ```

mod config;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use rgdm_calibrate::{Calibrator, ObservedTrips};
use rgdm_core::io::{read_friction_table, read_zone_totals, write_flows};
use rgdm_core::{distribute_sectors, Balancer, DeterrenceFunction, Exponential, FlowTable};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{sector_output, RunConfig};

/// Doubly-constrained gravity model
#[derive(Parser, Debug)]
#[command(name = "rgdm")]
#[command(about = "Distribute trips between zones with a doubly-constrained gravity model")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides this.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Balance zone totals over a friction table
    Balance {
        /// TOML run file
        #[arg(short, long)]
        config: PathBuf,

        /// Output CSV; one file per sector when several are configured
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Calibrate the deterrence decay against observed flows
    Calibrate {
        /// TOML run file
        #[arg(short, long)]
        config: PathBuf,

        /// Output CSV for the calibrated flows
        #[arg(short, long)]
        output: PathBuf,

        /// JSON report with the calibrated decay, diagnostics and history
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn open(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

fn write_flow_file(path: &Path, flows: &FlowTable) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    write_flows(BufWriter::new(file), flows)
        .with_context(|| format!("Failed to write flows to {}", path.display()))?;
    info!(path = %path.display(), records = flows.len(), "wrote flows");
    Ok(())
}

fn balance(config: &Path, output: &Path) -> Result<()> {
    let config = RunConfig::from_path(config)?;
    let zones = config.zones.context("Run file has no [zones] section")?;

    let sectors = read_zone_totals(open(&zones.path)?, &zones.columns)
        .with_context(|| format!("Failed to read zone totals from {}", zones.path.display()))?;
    let friction = read_friction_table(
        open(&config.friction.path)?,
        &config.friction.columns,
        config.deterrence.as_deref(),
    )
    .with_context(|| {
        format!(
            "Failed to read friction table from {}",
            config.friction.path.display()
        )
    })?;

    let balancer = Balancer::new(config.balancing)?;
    let results = distribute_sectors(&balancer, &sectors, &friction)?;

    let per_sector = results.len() > 1;
    for (sector, result) in &results {
        let path = if per_sector {
            sector_output(output, sector)
        } else {
            output.to_path_buf()
        };
        write_flow_file(&path, &result.flows)?;
        println!(
            "{}: {} iterations, converged = {}, error = {:.3e}",
            sector,
            result.convergence.iterations,
            result.convergence.converged,
            result.convergence.achieved_error
        );
    }
    Ok(())
}

fn calibrate(config: &Path, output: &Path, report: Option<&Path>) -> Result<()> {
    let config = RunConfig::from_path(config)?;
    config.friction.columns.ensure_observed()?;
    let family: Box<dyn DeterrenceFunction> = config
        .deterrence
        .unwrap_or_else(|| Box::new(Exponential::new(0.1)));

    let table = read_friction_table(
        open(&config.friction.path)?,
        &config.friction.columns,
        Some(family.as_ref()),
    )
    .with_context(|| {
        format!(
            "Failed to read observed trips from {}",
            config.friction.path.display()
        )
    })?;
    let observed = ObservedTrips::new(table)?;

    let calibrator = Calibrator::new(config.calibration)?;
    let result = calibrator.calibrate(&observed, family.as_ref())?;

    write_flow_file(output, &result.flows)?;
    if let Some(path) = report {
        let file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &result)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    println!(
        "decay = {:.6}, {} iterations, converged = {}, error = {:.3e}, coincidence ratio = {:.3}",
        result.decay,
        result.convergence.iterations,
        result.convergence.converged,
        result.convergence.achieved_error,
        result.coincidence_ratio
    );
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::Balance { config, output } => balance(&config, &output),
        Command::Calibrate {
            config,
            output,
            report,
        } => calibrate(&config, &output, report.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rgdm_core::RGDMError;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_calibrate() {
        let args = Args::try_parse_from([
            "rgdm", "calibrate", "-c", "run.toml", "-o", "flows.csv", "--report", "r.json", "-vv",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);
        match args.command {
            Command::Calibrate { report, .. } => assert_eq!(report, Some(PathBuf::from("r.json"))),
            other => panic!("unexpected command {:?}", other),
        }
    }

    const ZONES: &str = "\
zone,work_o,work_d,shop_o,shop_d
a,10,15,5,5
b,20,15,5,5
";

    const SKIM: &str = "\
from,to,friction,minutes,trips
a,a,1.0,10,30
a,b,0.5,20,10
b,a,0.5,20,10
b,b,1.0,10,30
";

    /// Writes the input tables and a run file, returning the run file path.
    fn write_run(dir: &Path, run: &str) -> PathBuf {
        std::fs::write(dir.join("zones.csv"), ZONES).unwrap();
        std::fs::write(dir.join("skim.csv"), SKIM).unwrap();
        let path = dir.join("run.toml");
        std::fs::write(&path, run).unwrap();
        path
    }

    /// `(origin, destination, flow)` rows of a written flow file.
    fn read_flows(path: &Path) -> Vec<(String, String, f64)> {
        let text = std::fs::read_to_string(path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("origin,destination,flow"));
        lines
            .map(|line| {
                let fields: Vec<&str> = line.split(',').collect();
                (
                    fields[0].to_string(),
                    fields[1].to_string(),
                    fields[2].parse().unwrap(),
                )
            })
            .collect()
    }

    const FRICTION: &str = r#"
[friction]
path = "skim.csv"
friction_origin_col = "from"
friction_dest_col = "to"
"#;

    #[test]
    fn test_balance_writes_one_file_per_sector() {
        let dir = tempfile::tempdir().unwrap();
        let run = format!(
            r#"
[zones]
path = "zones.csv"
zone_id = "zone"

[[zones.sectors]]
name = "work"
origin_total_col = "work_o"
dest_total_col = "work_d"

[[zones.sectors]]
name = "shop"
origin_total_col = "shop_o"
dest_total_col = "shop_d"
{}friction_value_col = "friction"

[balancing]
tolerance = 1e-8
"#,
            FRICTION
        );
        let config = write_run(dir.path(), &run);
        let output = dir.path().join("out").join("flows.csv");
        std::fs::create_dir(dir.path().join("out")).unwrap();

        balance(&config, &output).unwrap();

        assert!(!output.exists());
        let work = read_flows(&dir.path().join("out").join("flows_work.csv"));
        assert_eq!(work.len(), 4);
        let work_total: f64 = work.iter().map(|(_, _, flow)| flow).sum();
        assert!((work_total - 30.0).abs() < 1e-6);
        let a_row: f64 = work.iter().filter(|(o, _, _)| o == "a").map(|r| r.2).sum();
        assert!((a_row - 10.0).abs() < 1e-6);

        let shop = read_flows(&dir.path().join("out").join("flows_shop.csv"));
        // Symmetric totals and friction split each zone 2:1 between home and away
        assert!((shop[0].2 - 10.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_balance_single_sector_and_missing_zones() {
        let dir = tempfile::tempdir().unwrap();
        let run = format!(
            r#"
[zones]
path = "zones.csv"
zone_id = "zone"
origin_total_col = "work_o"
dest_total_col = "work_d"
{}friction_value_col = "friction"
"#,
            FRICTION
        );
        let config = write_run(dir.path(), &run);
        let output = dir.path().join("flows.csv");
        balance(&config, &output).unwrap();
        assert_eq!(read_flows(&output).len(), 4);

        let config = write_run(
            dir.path(),
            &format!("{}friction_value_col = \"friction\"\n", FRICTION),
        );
        let err = balance(&config, &output).unwrap_err();
        assert!(err.to_string().contains("[zones]"));
    }

    #[test]
    fn test_calibrate_writes_flows_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let run = format!(
            r#"{}travel_time_col = "minutes"
observed_flow_col = "trips"

[calibration]
calibration_tolerance = 0.01

[deterrence]
type = "Exponential"
beta = 0.5
"#,
            FRICTION
        );
        let config = write_run(dir.path(), &run);
        let output = dir.path().join("flows.csv");
        let report = dir.path().join("report.json");

        calibrate(&config, &output, Some(&report)).unwrap();

        let flows = read_flows(&output);
        assert_eq!(flows.len(), 4);
        let total: f64 = flows.iter().map(|r| r.2).sum();
        assert!((total - 80.0).abs() < 1e-4);

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
        assert_eq!(report["convergence"]["converged"], true);
        assert_eq!(report["deterrence"]["type"], "Exponential");
        assert_eq!(report["observed_mean_trip_length"], 12.5);
        let decay = report["decay"].as_f64().unwrap();
        assert!((decay - 3f64.ln() / 10.0).abs() < 0.01);
        assert!(!report["history"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_calibrate_requires_observed_columns() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_run(
            dir.path(),
            &format!("{}travel_time_col = \"minutes\"\n", FRICTION),
        );
        let output = dir.path().join("flows.csv");

        let err = calibrate(&config, &output, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RGDMError>(),
            Some(RGDMError::MissingOption(option)) if option == "observed_flow_col"
        ));
        assert!(!output.exists());
    }
}
