use gbmsim_core::{ReturnStatistics, Result, SimError, F};
use serde::{Deserialize, Serialize};

/// Geometric Brownian Motion: dS_t = μ S_t dt + σ S_t dW_t
///
/// Paths are advanced with the exact solution
/// S_{t+dt} = S_t * exp((μ - σ²/2)dt + σ√dt Z), which keeps every price
/// strictly positive whatever the step size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeometricBrownianMotion {
    pub mu: F,
    pub sigma: F,
}

impl GeometricBrownianMotion {
    pub fn new(mu: F, sigma: F) -> Self {
        Self { mu, sigma }
    }

    pub fn from_stats(stats: &ReturnStatistics) -> Self {
        Self::new(stats.mu(), stats.sigma())
    }

    /// Rejects parameters the exact step cannot use.
    pub fn validate(&self) -> Result<()> {
        if !self.mu.is_finite() {
            return Err(SimError::invalid("mu", format!("must be finite, got {}", self.mu)));
        }
        if !(self.sigma.is_finite() && self.sigma >= 0.0) {
            return Err(SimError::invalid(
                "sigma",
                format!("must be finite and non-negative, got {}", self.sigma),
            ));
        }
        Ok(())
    }

    /// Itô-corrected drift of the log price, μ - σ²/2
    pub fn log_drift(&self) -> F {
        self.mu - 0.5 * self.sigma * self.sigma
    }

    /// (μ - σ²/2)dt + σ√dt z
    pub fn log_increment(&self, dt: F, z: F) -> F {
        self.log_drift() * dt + self.sigma * dt.sqrt() * z
    }

    /// Exact step, floored at `F::MIN_POSITIVE` since `exp` underflows to
    /// zero for very negative increments.
    pub fn step(&self, price: F, dt: F, z: F) -> F {
        (price * self.log_increment(dt, z).exp()).max(F::MIN_POSITIVE)
    }

    /// E[S_t] = S_0 exp(μt)
    pub fn exact_mean(&self, x0: F, t: F) -> F {
        x0 * (self.mu * t).exp()
    }

    /// Var[S_t] = S_0² exp(2μt) (exp(σ²t) - 1)
    pub fn exact_variance(&self, x0: F, t: F) -> F {
        let exp_2mu_t = (2.0 * self.mu * t).exp();
        let exp_sigma2_t = (self.sigma * self.sigma * t).exp();
        x0 * x0 * exp_2mu_t * (exp_sigma2_t - 1.0)
    }

    /// Central interval of S_t holding probability 2Φ(z) - 1,
    /// e.g. z = 1.96 for 95%.
    pub fn lognormal_interval(&self, x0: F, t: F, z: F) -> (F, F) {
        let center = self.log_drift() * t;
        let half_width = z * self.sigma * t.sqrt();
        (x0 * (center - half_width).exp(), x0 * (center + half_width).exp())
    }
}

impl From<ReturnStatistics> for GeometricBrownianMotion {
    fn from(stats: ReturnStatistics) -> Self {
        Self::from_stats(&stats)
    }
}
