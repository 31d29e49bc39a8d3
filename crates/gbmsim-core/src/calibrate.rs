use crate::{HistoricalSeries, Result, SimError, F};
use serde::{Deserialize, Serialize};

/// Fewest valid prices `calibrate` accepts: two returns are needed for a
/// sample standard deviation.
pub const MIN_OBSERVATIONS: usize = 3;

/// How period-over-period returns are measured.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnKind {
    /// `(p_i - p_{i-1}) / p_{i-1}`
    #[default]
    Simple,
    /// `ln(p_i / p_{i-1})`
    Log,
}

/// Per-step drift and volatility estimated from a price history.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReturnStatistics {
    mu: F,
    sigma: F,
    n_returns: usize,
}

impl ReturnStatistics {
    /// Statistics supplied directly rather than estimated.
    pub fn new(mu: F, sigma: F) -> Self {
        Self { mu, sigma, n_returns: 0 }
    }

    pub fn mu(&self) -> F {
        self.mu
    }

    pub fn sigma(&self) -> F {
        self.sigma
    }

    /// Number of returns the estimate is based on (0 when supplied directly).
    pub fn n_returns(&self) -> usize {
        self.n_returns
    }

    /// Scales per-step figures to a longer period, e.g. 252 trading days.
    pub fn annualized(&self, periods: F) -> (F, F) {
        (self.mu * periods, self.sigma * periods.sqrt())
    }
}

/// Calibrates with simple returns.
pub fn calibrate(series: &HistoricalSeries) -> Result<ReturnStatistics> {
    calibrate_with(series, ReturnKind::Simple)
}

pub fn calibrate_with(series: &HistoricalSeries, kind: ReturnKind) -> Result<ReturnStatistics> {
    if series.len() < MIN_OBSERVATIONS {
        return Err(SimError::InsufficientData {
            required: MIN_OBSERVATIONS,
            actual: series.len(),
        });
    }

    let rets = returns(series, kind);
    let n = rets.len() as F;
    let mu = rets.iter().sum::<F>() / n;
    let var = rets.iter().map(|r| (r - mu).powi(2)).sum::<F>() / (n - 1.0);

    let stats = ReturnStatistics {
        mu,
        sigma: var.sqrt(),
        n_returns: rets.len(),
    };
    tracing::debug!(?kind, mu = stats.mu, sigma = stats.sigma, n = stats.n_returns, "calibrated");
    Ok(stats)
}

/// Returns between consecutive prices of the series.
pub fn returns(series: &HistoricalSeries, kind: ReturnKind) -> Vec<F> {
    series
        .prices()
        .windows(2)
        .map(|w| match kind {
            ReturnKind::Simple => (w[1] - w[0]) / w[0],
            ReturnKind::Log => (w[1] / w[0]).ln(),
        })
        .collect()
}
