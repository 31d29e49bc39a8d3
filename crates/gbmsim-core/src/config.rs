use crate::{HistoricalSeries, Result, SimError, F};
use serde::Serialize;

/// Simulation shape: how many paths, how many steps of what size, and
/// where every path starts. All fields are positive by construction.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimulationConfig {
    path_count: usize,
    step_count: usize,
    step_size: F,
    initial_price: F,
}

impl SimulationConfig {
    pub fn new(path_count: usize, step_count: usize, step_size: F, initial_price: F) -> Result<Self> {
        if path_count == 0 {
            return Err(SimError::invalid("path_count", "must be at least 1"));
        }
        if step_count == 0 {
            return Err(SimError::invalid("step_count", "must be at least 1"));
        }
        if !(step_size.is_finite() && step_size > 0.0) {
            return Err(SimError::invalid(
                "step_size",
                format!("must be positive and finite, got {step_size}"),
            ));
        }
        if !(initial_price.is_finite() && initial_price > 0.0) {
            return Err(SimError::invalid(
                "initial_price",
                format!("must be positive and finite, got {initial_price}"),
            ));
        }

        Ok(Self { path_count, step_count, step_size, initial_price })
    }

    /// Config starting from the last observed price of `series`.
    pub fn anchored(
        series: &HistoricalSeries,
        path_count: usize,
        step_count: usize,
        step_size: F,
    ) -> Result<Self> {
        let initial_price = series.last_price().ok_or(SimError::InsufficientData {
            required: 1,
            actual: 0,
        })?;
        Self::new(path_count, step_count, step_size, initial_price)
    }

    pub fn path_count(&self) -> usize {
        self.path_count
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn step_size(&self) -> F {
        self.step_size
    }

    pub fn initial_price(&self) -> F {
        self.initial_price
    }

    /// Simulated time span, `step_count * step_size`.
    pub fn horizon(&self) -> F {
        self.step_count as F * self.step_size
    }

    /// Entries per produced path.
    pub fn path_len(&self) -> usize {
        self.step_count + 1
    }
}
