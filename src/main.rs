use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use enrolment_insights::config::{ANOMALY_THRESHOLD, DEFAULT_CSV_PATH, ROLLING_WINDOW};
use enrolment_insights::filter::{DateBound, PincodeSelector};
use enrolment_insights::{loader, report, AnomalyParams, Dataset, FilterRequest, Session};

#[derive(Parser)]
#[command(name = "enrolment-insights")]
#[command(about = "Enrolment statistics and anomaly detection", long_about = None)]
struct Cli {
    /// Enrolment CSV to load
    #[arg(long, global = true, env = "ENROLMENT_CSV", default_value = DEFAULT_CSV_PATH)]
    csv: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FilterArgs {
    /// Inclusive lower date bound
    #[arg(long)]
    start_date: Option<String>,
    /// Inclusive upper date bound
    #[arg(long)]
    end_date: Option<String>,
    /// Restrict to these pincodes (repeatable)
    #[arg(long = "pincode")]
    pincodes: Vec<String>,
}

impl FilterArgs {
    fn to_request(&self) -> FilterRequest {
        FilterRequest {
            start_date: self.start_date.as_deref().map(DateBound::from),
            end_date: self.end_date.as_deref().map(DateBound::from),
            pincodes: (!self.pincodes.is_empty())
                .then(|| PincodeSelector::from(self.pincodes.clone())),
        }
    }

    fn scope_label(&self) -> Option<String> {
        (!self.pincodes.is_empty()).then(|| format!("pincodes {}", self.pincodes.join(", ")))
    }
}

#[derive(Args)]
struct DetectorArgs {
    #[arg(long, env = "ANOMALY_THRESHOLD", default_value_t = ANOMALY_THRESHOLD)]
    threshold: f64,
    #[arg(long, env = "ROLLING_WINDOW", default_value_t = ROLLING_WINDOW)]
    window: usize,
}

impl DetectorArgs {
    fn params(&self) -> AnomalyParams {
        AnomalyParams::default()
            .with_threshold(self.threshold)
            .with_rolling_window(self.window)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Describe the loaded dataset
    Info,
    /// Run the full statistical analysis
    Analyze {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Run every anomaly detector
    Anomalies {
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        detector: DetectorArgs,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        detector: DetectorArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Write the cleaned dataset back to CSV
    Export {
        #[arg(long)]
        out: PathBuf,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let table = loader::load_csv(&cli.csv)
        .with_context(|| format!("failed to load {}", cli.csv.display()))?;

    let mut session = Session::default();
    let info = session.replace(Dataset::from_table(table));

    match cli.command {
        Commands::Info => print_json(&info)?,
        Commands::Analyze { filter } => {
            let analysis = session.analyze(&filter.to_request())?;
            print_json(&analysis)?;
        }
        Commands::Anomalies { filter, detector } => {
            let anomalies = session.detect_anomalies(&filter.to_request(), Some(detector.params()))?;
            print_json(&anomalies)?;
        }
        Commands::Report {
            filter,
            detector,
            out,
        } => {
            let request = filter.to_request();
            let analysis = session.analyze(&request)?;
            let anomalies = session.detect_anomalies(&request, Some(detector.params()))?;
            let report = report::build_report(filter.scope_label().as_deref(), &analysis, &anomalies);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { out } => {
            let dataset = session.snapshot()?;
            loader::export_csv(&out, &dataset.records)?;
            println!("Exported {} records to {}.", dataset.records.len(), out.display());
        }
    }

    Ok(())
}
