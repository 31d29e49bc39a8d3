use crate::F;
use serde::{Deserialize, Serialize};

/// One simulated price trajectory. Index 0 is the starting price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricePath {
    prices: Vec<F>,
}

impl PricePath {
    pub fn new(prices: Vec<F>) -> Self {
        Self { prices }
    }

    pub fn prices(&self) -> &[F] {
        &self.prices
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn initial_price(&self) -> Option<F> {
        self.prices.first().copied()
    }

    pub fn terminal_price(&self) -> Option<F> {
        self.prices.last().copied()
    }

    /// `ln(terminal / initial)`
    pub fn total_log_return(&self) -> Option<F> {
        match (self.initial_price(), self.terminal_price()) {
            (Some(first), Some(last)) => Some((last / first).ln()),
            _ => None,
        }
    }
}

/// A single row of a traced path. Step 0 carries no draw and no increment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    pub draw: Option<F>,
    pub log_increment: Option<F>,
    pub price: F,
}

/// A path together with the draws and log increments that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct TracedPath {
    pub records: Vec<StepRecord>,
}

impl TracedPath {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { records: Vec::with_capacity(capacity) }
    }

    pub fn push(&mut self, record: StepRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_price_path(&self) -> PricePath {
        PricePath::new(self.records.iter().map(|r| r.price).collect())
    }
}
