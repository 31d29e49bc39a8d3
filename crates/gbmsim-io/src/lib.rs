use gbmsim_core::{ReturnKind, ReturnStatistics, SimulationConfig, TracedPath, F};
use gbmsim_sampler::Ensemble;
use anyhow::Context;
use arrow::array::{Array, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

pub mod cli;
pub mod loader;
pub mod settings;

pub use cli::*;
pub use loader::{resolve_data_path, SeriesLoader};
pub use settings::SimulationSettings;

/// Run manifest for complete reproducibility
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub timestamp: String,
    pub seed: u64,
    pub parallel: bool,
    pub mu: F,
    pub sigma: F,
    pub n_returns: usize,
    pub return_kind: Option<ReturnKind>,
    pub input: Option<String>,
    pub n_paths: usize,
    pub n_steps: usize,
    pub step_size: F,
    pub initial_price: F,
    pub horizon: F,
    pub commit_hash: Option<String>,
    pub rust_version: String,
}

/// Parquet writer for ensembles in long format:
/// one row per (path, step).
pub struct ParquetWriter {
    writer: ArrowWriter<File>,
    schema: Arc<Schema>,
}

/// Single row in the trace table; empty cells at step 0.
#[derive(Debug, Serialize)]
struct TraceRow {
    step: usize,
    normal: Option<F>,
    log_increment: Option<F>,
    price: F,
}

impl RunManifest {
    pub fn new(
        stats: &ReturnStatistics,
        config: &SimulationConfig,
        seed: u64,
        parallel: bool,
        return_kind: Option<ReturnKind>,
        input: Option<&Path>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            seed,
            parallel,
            mu: stats.mu(),
            sigma: stats.sigma(),
            n_returns: stats.n_returns(),
            return_kind,
            input: input.map(|p| p.display().to_string()),
            n_paths: 0, // Set when writing
            n_steps: config.step_count(),
            step_size: config.step_size(),
            initial_price: config.initial_price(),
            horizon: config.horizon(),
            commit_hash: get_git_commit(),
            rust_version: get_rust_version(),
        }
    }

    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write manifest {}", path.display()))?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        let manifest = serde_json::from_str(&json)?;
        Ok(manifest)
    }
}

impl ParquetWriter {
    pub fn new(file_path: &Path) -> anyhow::Result<Self> {
        let file = File::create(file_path)
            .with_context(|| format!("failed to create {}", file_path.display()))?;

        let schema = Arc::new(Schema::new(vec![
            Field::new("run_id", DataType::Utf8, false),
            Field::new("path_id", DataType::UInt64, false),
            Field::new("step", DataType::UInt64, false),
            Field::new("time", DataType::Float64, false),
            Field::new("price", DataType::Float64, false),
        ]));
        let writer = ArrowWriter::try_new(file, schema.clone(), None)?;

        Ok(Self { writer, schema })
    }

    pub fn write_ensemble(&mut self, ensemble: &Ensemble, manifest: &RunManifest) -> anyhow::Result<()> {
        let dt = ensemble.config().step_size();
        let n_rows = ensemble.n_paths() * ensemble.config().path_len();
        if n_rows == 0 {
            return Ok(());
        }

        let mut path_ids = Vec::with_capacity(n_rows);
        let mut steps = Vec::with_capacity(n_rows);
        let mut times = Vec::with_capacity(n_rows);
        let mut prices = Vec::with_capacity(n_rows);

        for (path_id, path) in ensemble.paths().iter().enumerate() {
            for (step, price) in path.prices().iter().enumerate() {
                path_ids.push(path_id as u64);
                steps.push(step as u64);
                times.push(step as F * dt);
                prices.push(*price);
            }
        }

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(vec![manifest.run_id.as_str(); path_ids.len()])),
            Arc::new(UInt64Array::from(path_ids)),
            Arc::new(UInt64Array::from(steps)),
            Arc::new(Float64Array::from(times)),
            Arc::new(Float64Array::from(prices)),
        ];

        let batch = RecordBatch::try_new(self.schema.clone(), arrays)?;
        self.writer.write(&batch)?;
        Ok(())
    }

    pub fn close(self) -> anyhow::Result<()> {
        self.writer.close()?;
        Ok(())
    }
}

/// Write ensemble to Parquet with manifest
pub fn write_ensemble_with_manifest(
    ensemble: &Ensemble,
    manifest: &RunManifest,
    parquet_path: &Path,
    manifest_path: &Path,
) -> anyhow::Result<()> {
    let mut writer = ParquetWriter::new(parquet_path)?;
    writer.write_ensemble(ensemble, manifest)?;
    writer.close()?;

    let mut manifest_with_paths = manifest.clone();
    manifest_with_paths.n_paths = ensemble.n_paths();
    manifest_with_paths.save_to_file(manifest_path)?;

    tracing::info!(paths = ensemble.n_paths(), path = %parquet_path.display(), "wrote ensemble");
    tracing::info!(path = %manifest_path.display(), "wrote manifest");

    Ok(())
}

/// Writes a traced path as CSV with columns `step,normal,log_increment,price`.
pub fn write_trace_csv(trace: &TracedPath, path: &Path) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    for record in &trace.records {
        writer.serialize(TraceRow {
            step: record.step,
            normal: record.draw,
            log_increment: record.log_increment,
            price: record.price,
        })?;
    }
    writer.flush()?;

    tracing::info!(rows = trace.len(), path = %path.display(), "wrote trace");
    Ok(())
}

/// Get git commit hash for reproducibility
fn get_git_commit() -> Option<String> {
    std::process::Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                String::from_utf8(output.stdout).ok()
            } else {
                None
            }
        })
        .map(|s| s.trim().to_string())
}

fn get_rust_version() -> String {
    std::process::Command::new("rustc")
        .arg("--version")
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                String::from_utf8(output.stdout).ok()
            } else {
                None
            }
        })
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
