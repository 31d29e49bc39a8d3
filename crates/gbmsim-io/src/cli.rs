use crate::{
    resolve_data_path, write_ensemble_with_manifest, write_trace_csv, RunManifest, SeriesLoader,
    SimulationSettings,
};
use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use gbmsim_core::{
    calibrate_with, HistoricalSeries, NoiseGenerator, NormalStreams, ReturnKind, ReturnStatistics,
    SeededStreams, SimulationConfig,
};
use gbmsim_sampler::{Ensemble, Sampler};
use std::path::PathBuf;

const TRADING_DAYS: f64 = 252.0;

#[derive(Parser)]
#[command(name = "gbmsim")]
#[command(about = "Monte-Carlo price paths under Geometric Brownian Motion")]
#[command(long_about = "Calibrates drift and volatility from a price history and simulates \
                        exact-solution GBM paths")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Estimate drift and volatility from a CSV price history
    Calibrate(CalibrateArgs),
    /// Simulate price paths and write them out
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
pub struct InputArgs {
    /// CSV file with a price column
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Extra directories searched for the input file
    #[arg(long = "search-dir")]
    pub search_dirs: Vec<PathBuf>,

    /// Price column name
    #[arg(long)]
    pub column: Option<String>,

    /// Lines to skip before the header row
    #[arg(long)]
    pub skip_rows: Option<usize>,

    /// Return definition used for calibration
    #[arg(long, value_enum)]
    pub returns: Option<ReturnsType>,
}

#[derive(Args, Debug)]
pub struct CalibrateArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// JSON settings file; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Per-step drift, used instead of calibrating
    #[arg(long, conflicts_with = "input", requires = "sigma")]
    pub mu: Option<f64>,

    /// Per-step volatility, used instead of calibrating
    #[arg(long, conflicts_with = "input", requires = "mu")]
    pub sigma: Option<f64>,

    /// Starting price (defaults to the last observed price)
    #[arg(long)]
    pub s0: Option<f64>,

    /// Number of paths
    #[arg(long)]
    pub paths: Option<usize>,

    /// Number of steps per path
    #[arg(long)]
    pub steps: Option<usize>,

    /// Step size in years
    #[arg(long)]
    pub dt: Option<f64>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Confidence level for value at risk
    #[arg(long)]
    pub confidence: Option<f64>,

    /// Generate paths on all cores, one random stream per path
    #[arg(long)]
    pub parallel: bool,

    /// Output Parquet file for all paths
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Output CSV file tracing the first path step by step
    #[arg(long)]
    pub trace_out: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ReturnsType {
    #[value(name = "simple")]
    Simple,
    #[value(name = "log")]
    Log,
}

impl From<ReturnsType> for ReturnKind {
    fn from(returns: ReturnsType) -> Self {
        match returns {
            ReturnsType::Simple => ReturnKind::Simple,
            ReturnsType::Log => ReturnKind::Log,
        }
    }
}

impl SimulateArgs {
    /// Overlays explicit flags on top of `settings`.
    pub fn apply(&self, mut settings: SimulationSettings) -> SimulationSettings {
        if let Some(paths) = self.paths {
            settings.paths = paths;
        }
        if let Some(steps) = self.steps {
            settings.steps = steps;
        }
        if let Some(dt) = self.dt {
            settings.dt = dt;
        }
        if let Some(seed) = self.seed {
            settings.seed = seed;
        }
        if let Some(confidence) = self.confidence {
            settings.confidence = confidence;
        }
        if let Some(returns) = self.input.returns {
            settings.returns = returns.into();
        }
        if let Some(column) = &self.input.column {
            settings.column = column.clone();
        }
        if let Some(skip_rows) = self.input.skip_rows {
            settings.skip_rows = skip_rows;
        }
        settings.parallel |= self.parallel;
        settings
    }
}

fn load_series(input: &InputArgs, column: &str, skip_rows: usize) -> anyhow::Result<(PathBuf, HistoricalSeries)> {
    let Some(file) = &input.input else {
        bail!("--input is required");
    };
    let path = resolve_data_path(&file.to_string_lossy(), &input.search_dirs)?;
    let series = SeriesLoader::new()
        .with_price_column(column)
        .with_skip_rows(skip_rows)
        .load(&path)?;
    Ok((path, series))
}

pub async fn run_calibrate_command(args: CalibrateArgs) -> anyhow::Result<()> {
    let defaults = SimulationSettings::default();
    let column = args.input.column.clone().unwrap_or(defaults.column);
    let skip_rows = args.input.skip_rows.unwrap_or(defaults.skip_rows);
    let kind = args.input.returns.map(ReturnKind::from).unwrap_or(defaults.returns);

    let (path, series) = load_series(&args.input, &column, skip_rows)?;
    let stats = calibrate_with(&series, kind)
        .with_context(|| format!("cannot calibrate from {}", path.display()))?;
    let (mu_annual, sigma_annual) = stats.annualized(TRADING_DAYS);

    println!("gbmsim calibration");
    println!("==================");
    println!("Input: {}", path.display());
    println!("Returns: {:?} ({} observations)", kind, stats.n_returns());
    println!("mu (per step): {:.6}", stats.mu());
    println!("sigma (per step): {:.6}", stats.sigma());
    println!("mu (annualised): {:.4}", mu_annual);
    println!("sigma (annualised): {:.4}", sigma_annual);
    if let Some(last) = series.last_price() {
        println!("Last price: {:.4}", last);
    }

    Ok(())
}

pub async fn run_simulate_command(args: SimulateArgs) -> anyhow::Result<()> {
    let settings = args.apply(SimulationSettings::resolve(args.config.as_deref())?);
    tracing::debug!(?settings, "resolved settings");

    // Calibrate from history or take parameters as given
    let (stats, last_price, input_path, return_kind) = match (args.mu, args.sigma) {
        (Some(mu), Some(sigma)) => (ReturnStatistics::new(mu, sigma), None, None, None),
        _ => {
            let (path, series) = load_series(&args.input, &settings.column, settings.skip_rows)?;
            let stats = calibrate_with(&series, settings.returns)
                .with_context(|| format!("cannot calibrate from {}", path.display()))?;
            (stats, series.last_price(), Some(path), Some(settings.returns))
        }
    };

    let Some(s0) = args.s0.or(last_price) else {
        bail!("--s0 is required when --mu/--sigma are given");
    };
    let config = SimulationConfig::new(settings.paths, settings.steps, settings.dt, s0)?;
    let sampler = Sampler::new(&stats, config.clone())?;

    println!("gbmsim simulation");
    println!("=================");
    println!("mu: {:.6}, sigma: {:.6}", stats.mu(), stats.sigma());
    println!("Paths: {}", config.path_count());
    println!("Steps: {}", config.step_count());
    println!("dt: {:.6}", config.step_size());
    println!("Initial price: {:.4}", config.initial_price());
    println!("Seed: {}", settings.seed);

    // Path 0 of both modes is reproducible from its own source, so the
    // trace always matches the first exported path.
    let streams = SeededStreams::new(settings.seed);
    let ensemble = if settings.parallel {
        sampler.run_paths_parallel(&streams)
    } else {
        sampler.run_paths(&mut NoiseGenerator::new(settings.seed))
    };

    if let Some(trace_out) = &args.trace_out {
        let trace = if settings.parallel {
            sampler.trace_path(&mut streams.stream(0))
        } else {
            sampler.trace_path(&mut NoiseGenerator::new(settings.seed))
        };
        write_trace_csv(&trace, trace_out)?;
    }

    if let Some(out) = &args.out {
        let manifest = RunManifest::new(
            &stats,
            &config,
            settings.seed,
            settings.parallel,
            return_kind,
            input_path.as_deref(),
        );
        let manifest_path = out.with_extension("manifest.json");
        write_ensemble_with_manifest(&ensemble, &manifest, out, &manifest_path)?;
    }

    print_summary(&sampler, &ensemble, settings.confidence)?;
    Ok(())
}

fn print_summary(sampler: &Sampler, ensemble: &Ensemble, confidence: f64) -> anyhow::Result<()> {
    let config = sampler.config();
    let model = sampler.model();
    let stats = ensemble.final_statistics();

    println!();
    println!("Summary Statistics:");
    println!("==================");
    for (path_id, path) in ensemble.paths().iter().enumerate().take(10) {
        let final_value = path.terminal_price().unwrap_or(config.initial_price());
        let return_pct = path.total_log_return().map_or(0.0, |r| r.exp_m1() * 100.0);
        println!("Path {}: Final value = {:.2}, Return = {:.2}%", path_id, final_value, return_pct);
    }
    if ensemble.n_paths() > 10 {
        println!("... {} more paths", ensemble.n_paths() - 10);
    }

    println!("Terminal mean: {:.4} (analytic {:.4})", stats.terminal_mean,
             model.exact_mean(config.initial_price(), config.horizon()));
    println!("Terminal std: {:.4} (analytic {:.4})", stats.terminal_std,
             model.exact_variance(config.initial_price(), config.horizon()).sqrt());
    println!("Terminal range: [{:.4}, {:.4}]", stats.terminal_min, stats.terminal_max);

    let (lo, hi) = model.lognormal_interval(config.initial_price(), config.horizon(), 1.96);
    println!("95% lognormal interval: [{:.4}, {:.4}]", lo, hi);

    if ensemble.n_paths() >= 2 {
        let var = ensemble.value_at_risk(confidence)?;
        println!("VaR ({:.1}%): {:.4}", confidence * 100.0, var);
    }

    Ok(())
}
