//! Loading price histories from CSV files.
//!
//! Price cells are coerced to numbers the lenient way: anything that does not
//! parse becomes a missing value and is dropped by [`HistoricalSeries`].

use anyhow::{bail, Context};
use csv::ReaderBuilder;
use gbmsim_core::{HistoricalSeries, Observation, F};
use std::fs::File;
use std::path::{Path, PathBuf};

/// CSV loader for a single price column
#[derive(Clone, Debug)]
pub struct SeriesLoader {
    /// Column holding prices
    pub price_column: String,
    /// Column holding dates; row numbers are used when absent
    pub date_column: String,
    /// Lines skipped before the header row
    pub skip_rows: usize,
}

impl Default for SeriesLoader {
    fn default() -> Self {
        Self {
            price_column: "Close".to_string(),
            date_column: "Date".to_string(),
            skip_rows: 0,
        }
    }
}

impl SeriesLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price_column(mut self, column: impl Into<String>) -> Self {
        self.price_column = column.into();
        self
    }

    pub fn with_date_column(mut self, column: impl Into<String>) -> Self {
        self.date_column = column.into();
        self
    }

    pub fn with_skip_rows(mut self, skip_rows: usize) -> Self {
        self.skip_rows = skip_rows;
        self
    }

    pub fn load<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<HistoricalSeries> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);
        let mut records = reader.records().skip(self.skip_rows);

        let headers = match records.next() {
            Some(row) => row.with_context(|| format!("failed to read header of {}", path.display()))?,
            None => bail!("{} has no header row", path.display()),
        };

        let price_idx = match headers.iter().position(|h| h.trim() == self.price_column) {
            Some(idx) => idx,
            None => bail!(
                "column '{}' not found in {}; available columns: {:?}",
                self.price_column,
                path.display(),
                headers.iter().collect::<Vec<_>>()
            ),
        };
        let date_idx = headers.iter().position(|h| h.trim() == self.date_column);

        let mut observations = Vec::new();
        for (row_idx, result) in records.enumerate() {
            let record = result.with_context(|| {
                format!("failed to read row {} of {}", row_idx + 1, path.display())
            })?;
            let date = date_idx
                .and_then(|i| record.get(i))
                .map(|d| d.trim().to_string())
                .unwrap_or_else(|| row_idx.to_string());
            let price = record.get(price_idx).and_then(coerce_price);
            observations.push(Observation::new(date, price));
        }

        let total = observations.len();
        let series = HistoricalSeries::from_observations(observations);
        tracing::info!(
            path = %path.display(),
            rows = total,
            valid = series.len(),
            "loaded price series"
        );
        Ok(series)
    }
}

/// Lenient numeric coercion: unparsable cells become `None`.
fn coerce_price(cell: &str) -> Option<F> {
    let cleaned: String = cell.trim().chars().filter(|c| *c != ',' && *c != '$').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<F>().ok()
}

/// Finds `file_name` either as given or under one of `roots`, in order.
pub fn resolve_data_path(file_name: &str, roots: &[PathBuf]) -> anyhow::Result<PathBuf> {
    let candidates: Vec<PathBuf> = std::iter::once(PathBuf::from(file_name))
        .chain(roots.iter().map(|root| root.join(file_name)))
        .collect();

    for candidate in &candidates {
        if candidate.is_file() {
            tracing::debug!(path = %candidate.display(), "resolved data file");
            return Ok(candidate.clone());
        }
    }

    bail!(
        "data file '{}' not found; tried {:?}",
        file_name,
        candidates.iter().map(|c| c.display().to_string()).collect::<Vec<_>>()
    )
}
