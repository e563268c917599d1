// src/bin/tradesim.rs

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::{error, info};
use serde::de::DeserializeOwned;

use tradesim::engine::{run_backtest, Bar, BarSeries, SimulationSettings};
use tradesim::optimizer::{optimize_all, write_records, Dataset, OptimizerConfig};
use tradesim::strategies::{BreakoutParams, ChannelBreakout};

#[derive(Parser)]
#[command(name = "tradesim", version, about = "Bar-by-bar strategy backtester and GA optimizer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the channel-breakout strategy once and print the report
    Backtest(BacktestArgs),
    /// Search the channel-breakout parameter space
    Optimize(OptimizeArgs),
}

#[derive(Parser)]
struct BacktestArgs {
    /// CSV with header time,open,high,low,close,volume
    #[arg(long)]
    bars: PathBuf,

    /// JSON simulation settings; missing fields take their defaults
    #[arg(long)]
    settings: Option<PathBuf>,

    /// JSON strategy parameters
    #[arg(long)]
    params: Option<PathBuf>,

    /// Write the JSON report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Parser)]
struct OptimizeArgs {
    /// One or more bar CSVs; each is optimized independently
    #[arg(long, required = true, num_args = 1..)]
    bars: Vec<PathBuf>,

    #[arg(long)]
    settings: Option<PathBuf>,

    /// JSON optimizer config; environment variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fix the RNG seed
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value = "optimization.json")]
    output: PathBuf,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file)).with_context(|| format!("parsing {}", path.display()))
}

fn read_json_or_default<T: DeserializeOwned + Default>(path: Option<&Path>) -> anyhow::Result<T> {
    path.map_or_else(|| Ok(T::default()), read_json)
}

fn read_bars(path: &Path) -> anyhow::Result<BarSeries> {
    let mut rdr = csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    let mut series = BarSeries::default();
    for (row, bar) in rdr.deserialize::<Bar>().enumerate() {
        series.push(bar.with_context(|| format!("{}: row {}", path.display(), row + 1))?);
    }
    info!("{}: {} bars", path.display(), series.len());
    Ok(series)
}

fn dataset_name(path: &Path) -> String {
    path.file_stem().map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned())
}

fn backtest(args: BacktestArgs) -> anyhow::Result<()> {
    let bars = read_bars(&args.bars)?;
    let settings: SimulationSettings = read_json_or_default(args.settings.as_deref())?;
    let params: BreakoutParams = read_json_or_default(args.params.as_deref())?;

    let mut strategy = ChannelBreakout::new(params)?;
    let report = run_backtest(&mut strategy, &bars, &settings)?;
    info!(
        "{} deals, net profit {:.2} ({:.2}%)",
        report.result.ledger.len(),
        report.metrics.overall.net_profit,
        report.metrics.overall.net_profit_pct
    );

    match args.output {
        Some(path) => {
            let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
            serde_json::to_writer_pretty(BufWriter::new(file), &report)?;
        }
        None => {
            let mut out = std::io::stdout().lock();
            serde_json::to_writer_pretty(&mut out, &report)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn optimize(args: OptimizeArgs) -> anyhow::Result<()> {
    let settings: SimulationSettings = read_json_or_default(args.settings.as_deref())?;
    let mut config = read_json_or_default::<OptimizerConfig>(args.config.as_deref())?.with_env();
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let names: Vec<String> = args.bars.iter().map(|p| dataset_name(p)).collect();
    let series = args.bars.iter().map(|p| read_bars(p)).collect::<anyhow::Result<Vec<_>>>()?;
    let datasets: Vec<Dataset<'_>> =
        names.iter().zip(&series).map(|(name, bars)| Dataset { name, bars }).collect();

    let mut records = Vec::new();
    let mut failed = 0;
    for (name, outcome) in optimize_all::<ChannelBreakout>(&datasets, &settings, &config) {
        match outcome {
            Ok(mut found) => records.append(&mut found),
            Err(e) => {
                error!("{}: {}", name, e);
                failed += 1;
            }
        }
    }
    if records.is_empty() && failed > 0 {
        bail!("every dataset failed to optimize");
    }

    write_records(&args.output, &records)?;
    info!("wrote {} records to {}", records.len(), args.output.display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Commands::Backtest(args) => backtest(args),
        Commands::Optimize(args) => optimize(args),
    }
}
