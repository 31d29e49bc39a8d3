use gbmsim_core::{
    NormalSource, NormalStreams, PricePath, Result, ReturnStatistics, SimError, SimulationConfig,
    StepRecord, TracedPath, F,
};
use gbmsim_models::GeometricBrownianMotion;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::Serialize;

/// Main sampler for GBM price paths
#[derive(Clone, Debug)]
pub struct Sampler {
    model: GeometricBrownianMotion,
    config: SimulationConfig,
}

/// The paths of one simulation run, in path order.
/// Every path has `config.path_len()` entries.
#[derive(Clone, Debug)]
pub struct Ensemble {
    paths: Vec<PricePath>,
    config: SimulationConfig,
}

/// Statistical summary of ensemble
#[derive(Clone, Debug, Serialize)]
pub struct EnsembleStats {
    pub n_paths: usize,
    /// Cross-sectional mean price at every step
    pub step_means: DVector<F>,
    /// Cross-sectional sample variance at every step
    pub step_variances: DVector<F>,
    pub terminal_mean: F,
    pub terminal_std: F,
    pub terminal_min: F,
    pub terminal_max: F,
}

/// Simulates `config.path_count()` paths drawing from one source.
///
/// Path `k` consumes draws `k * step_count .. (k + 1) * step_count`, so no
/// draw is shared between paths.
pub fn simulate<R>(
    stats: &ReturnStatistics,
    config: &SimulationConfig,
    source: &mut R,
) -> Result<Vec<PricePath>>
where
    R: NormalSource + ?Sized,
{
    let sampler = Sampler::new(stats, config.clone())?;
    Ok(sampler.run_paths(source).into_paths())
}

impl Sampler {
    pub fn new(stats: &ReturnStatistics, config: SimulationConfig) -> Result<Self> {
        Self::from_model(GeometricBrownianMotion::from_stats(stats), config)
    }

    pub fn from_model(model: GeometricBrownianMotion, config: SimulationConfig) -> Result<Self> {
        model.validate()?;
        if model.sigma == 0.0 {
            tracing::debug!("zero volatility: every path follows the deterministic drift");
        }
        Ok(Self { model, config })
    }

    pub fn model(&self) -> &GeometricBrownianMotion {
        &self.model
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run ensemble of paths sequentially from a single source
    pub fn run_paths<R>(&self, source: &mut R) -> Ensemble
    where
        R: NormalSource + ?Sized,
    {
        tracing::debug!(
            paths = self.config.path_count(),
            steps = self.config.step_count(),
            "running paths"
        );
        let paths = (0..self.config.path_count())
            .map(|_| self.run_single_path(&mut *source, |_| {}))
            .collect();

        Ensemble::from_parts(paths, self.config.clone())
    }

    /// Run ensemble of paths in parallel, one stream per path id.
    ///
    /// The output depends only on the streams, not on the thread count.
    pub fn run_paths_parallel<S>(&self, streams: &S) -> Ensemble
    where
        S: NormalStreams,
    {
        tracing::debug!(
            paths = self.config.path_count(),
            steps = self.config.step_count(),
            threads = rayon::current_num_threads(),
            "running paths in parallel"
        );
        let paths: Vec<PricePath> = (0..self.config.path_count())
            .into_par_iter()
            .map(|path_id| {
                let mut rng = streams.stream(path_id as u64);
                self.run_single_path(&mut rng, |_| {})
            })
            .collect();

        Ensemble::from_parts(paths, self.config.clone())
    }

    /// One path with the draw and log increment behind every step.
    pub fn trace_path<R>(&self, source: &mut R) -> TracedPath
    where
        R: NormalSource + ?Sized,
    {
        let mut trace = TracedPath::with_capacity(self.config.path_len());
        self.run_single_path(source, |record| trace.push(record));
        trace
    }

    fn run_single_path<R, G>(&self, source: &mut R, mut on_step: G) -> PricePath
    where
        R: NormalSource + ?Sized,
        G: FnMut(StepRecord),
    {
        let dt = self.config.step_size();
        let mut price = self.config.initial_price();
        let mut prices = Vec::with_capacity(self.config.path_len());

        prices.push(price);
        on_step(StepRecord { step: 0, draw: None, log_increment: None, price });

        for step in 1..=self.config.step_count() {
            let z = source.next_standard_normal();
            let increment = self.model.log_increment(dt, z);
            // exp underflows to 0.0 on long, highly volatile paths
            price = (price * increment.exp()).max(F::MIN_POSITIVE);

            prices.push(price);
            on_step(StepRecord {
                step,
                draw: Some(z),
                log_increment: Some(increment),
                price,
            });
        }

        PricePath::new(prices)
    }
}

impl Ensemble {
    /// Checks that every path has `config.path_len()` entries.
    pub fn new(paths: Vec<PricePath>, config: SimulationConfig) -> Result<Self> {
        if let Some((path_id, path)) = paths
            .iter()
            .enumerate()
            .find(|(_, p)| p.len() != config.path_len())
        {
            return Err(SimError::invalid(
                "paths",
                format!(
                    "path {path_id} has {} entries, expected {}",
                    path.len(),
                    config.path_len()
                ),
            ));
        }
        Ok(Self::from_parts(paths, config))
    }

    fn from_parts(paths: Vec<PricePath>, config: SimulationConfig) -> Self {
        Self { paths, config }
    }

    pub fn paths(&self) -> &[PricePath] {
        &self.paths
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn into_paths(self) -> Vec<PricePath> {
        self.paths
    }

    pub fn n_paths(&self) -> usize {
        self.paths.len()
    }

    /// Paths as rows, steps as columns
    pub fn to_matrix(&self) -> DMatrix<F> {
        let n_cols = self.config.path_len();
        DMatrix::from_fn(self.paths.len(), n_cols, |i, j| self.paths[i].prices()[j])
    }

    pub fn terminal_prices(&self) -> Vec<F> {
        self.paths.iter().filter_map(|p| p.terminal_price()).collect()
    }

    pub fn final_statistics(&self) -> EnsembleStats {
        if self.paths.is_empty() {
            return EnsembleStats::empty();
        }

        let matrix = self.to_matrix();
        let n = matrix.nrows();
        let denom = (n - 1).max(1) as F;

        let step_means = DVector::from_iterator(matrix.ncols(), matrix.column_iter().map(|c| c.mean()));
        let step_variances = DVector::from_iterator(
            matrix.ncols(),
            matrix.column_iter().zip(step_means.iter()).map(|(c, m)| {
                c.iter().map(|x| (x - m).powi(2)).sum::<F>() / denom
            }),
        );

        let last = step_means.len() - 1;
        let terminal = self.terminal_prices();

        EnsembleStats {
            n_paths: n,
            terminal_mean: step_means[last],
            terminal_std: step_variances[last].sqrt(),
            terminal_min: terminal.iter().copied().fold(F::INFINITY, F::min),
            terminal_max: terminal.iter().copied().fold(F::NEG_INFINITY, F::max),
            step_means,
            step_variances,
        }
    }

    /// Empirical quantile of terminal prices with linear interpolation.
    pub fn terminal_quantile(&self, q: F) -> Result<F> {
        if !(0.0..=1.0).contains(&q) {
            return Err(SimError::invalid("quantile", format!("must lie in [0, 1], got {q}")));
        }
        let mut sorted = self.terminal_prices();
        if sorted.is_empty() {
            return Err(SimError::InsufficientData { required: 1, actual: 0 });
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        let h = q * (sorted.len() - 1) as F;
        let lo = h.floor() as usize;
        let hi = h.ceil() as usize;
        Ok(sorted[lo] + (h - lo as F) * (sorted[hi] - sorted[lo]))
    }

    /// Loss in price units over the horizon that is not exceeded with the
    /// given confidence: `initial_price - q_{1-confidence}(S_T)`.
    pub fn value_at_risk(&self, confidence: F) -> Result<F> {
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(SimError::invalid(
                "confidence",
                format!("must lie in (0, 1), got {confidence}"),
            ));
        }
        let q = self.terminal_quantile(1.0 - confidence)?;
        Ok(self.config.initial_price() - q)
    }
}

impl EnsembleStats {
    fn empty() -> Self {
        Self {
            n_paths: 0,
            step_means: DVector::zeros(0),
            step_variances: DVector::zeros(0),
            terminal_mean: F::NAN,
            terminal_std: F::NAN,
            terminal_min: F::NAN,
            terminal_max: F::NAN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gbmsim_core::{NoiseGenerator, ReplaySource};

    fn config(paths: usize, steps: usize) -> SimulationConfig {
        SimulationConfig::new(paths, steps, 1.0 / 252.0, 100.0).unwrap()
    }

    #[test]
    fn test_paths_consume_disjoint_draws() {
        let stats = ReturnStatistics::new(0.0, 0.2);
        let sampler = Sampler::new(&stats, config(3, 4)).unwrap();
        let mut source = ReplaySource::new((1..=12).map(|i| i as f64 / 10.0).collect());

        let ensemble = sampler.run_paths(&mut source);
        assert_eq!(source.consumed(), 12);
        assert_eq!(ensemble.n_paths(), 3);

        // the second path must start from draw 5
        let mut second_only = ReplaySource::new((5..=8).map(|i| i as f64 / 10.0).collect());
        let expected = Sampler::new(&stats, config(1, 4)).unwrap().run_paths(&mut second_only);
        assert_eq!(ensemble.paths()[1], expected.paths()[0]);
    }

    #[test]
    fn test_trace_matches_plain_run() {
        let stats = ReturnStatistics::new(0.001, 0.02);
        let sampler = Sampler::new(&stats, config(1, 50)).unwrap();

        let trace = sampler.trace_path(&mut NoiseGenerator::new(3));
        let plain = sampler.run_paths(&mut NoiseGenerator::new(3));

        assert_eq!(trace.len(), 51);
        assert_eq!(trace.records[0].draw, None);
        assert_eq!(trace.records[0].log_increment, None);
        assert!(trace.records[1..].iter().all(|r| r.draw.is_some() && r.log_increment.is_some()));
        assert_eq!(trace.to_price_path(), plain.paths()[0]);
    }

    #[test]
    fn test_negative_sigma_rejected() {
        let stats = ReturnStatistics::new(0.0, -0.1);
        let result = simulate(&stats, &config(1, 1), &mut ReplaySource::new(Vec::new()));
        assert!(matches!(result, Err(SimError::InvalidConfig { field: "sigma", .. })));
    }

    #[test]
    fn test_matrix_shape() {
        let stats = ReturnStatistics::new(0.0, 0.1);
        let ensemble = Sampler::new(&stats, config(4, 10))
            .unwrap()
            .run_paths(&mut NoiseGenerator::new(11));
        let m = ensemble.to_matrix();
        assert_eq!((m.nrows(), m.ncols()), (4, 11));
        assert!(m.column(0).iter().all(|&p| p == 100.0));
    }

    #[test]
    fn test_quantile_interpolates() {
        let cfg = SimulationConfig::new(4, 1, 1.0, 100.0).unwrap();
        let paths = [90.0, 110.0, 100.0, 80.0]
            .iter()
            .map(|&last| PricePath::new(vec![100.0, last]))
            .collect();
        let ensemble = Ensemble::new(paths, cfg).unwrap();

        assert_eq!(ensemble.terminal_quantile(0.0).unwrap(), 80.0);
        assert_eq!(ensemble.terminal_quantile(1.0).unwrap(), 110.0);
        assert!((ensemble.terminal_quantile(0.5).unwrap() - 95.0).abs() < 1e-12);
        // q = 1/3 falls exactly on the second order statistic
        assert!((ensemble.value_at_risk(2.0 / 3.0).unwrap() - 10.0).abs() < 1e-9);
        assert!(ensemble.terminal_quantile(1.5).is_err());
        assert!(ensemble.value_at_risk(1.0).is_err());
    }

    #[test]
    fn test_final_statistics() {
        let cfg = SimulationConfig::new(2, 1, 1.0, 100.0).unwrap();
        let ensemble = Ensemble::new(
            vec![PricePath::new(vec![100.0, 90.0]), PricePath::new(vec![100.0, 110.0])],
            cfg,
        )
        .unwrap();
        let stats = ensemble.final_statistics();

        assert_eq!(stats.n_paths, 2);
        assert_eq!(stats.step_means.as_slice(), &[100.0, 100.0]);
        assert_eq!(stats.step_variances.as_slice(), &[0.0, 200.0]);
        assert_eq!(stats.terminal_min, 90.0);
        assert_eq!(stats.terminal_max, 110.0);
        assert!((stats.terminal_std - 200f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_mismatched_path_length_rejected() {
        let cfg = SimulationConfig::new(1, 2, 1.0, 100.0).unwrap();
        let result = Ensemble::new(vec![PricePath::new(vec![100.0, 101.0])], cfg);
        assert!(matches!(result, Err(SimError::InvalidConfig { field: "paths", .. })));
    }

    #[test]
    fn test_prices_floored_above_zero() {
        let stats = ReturnStatistics::new(0.05, 2.5);
        let cfg = SimulationConfig::new(1, 400, 1.0, 10.0).unwrap();
        // a steady run of negative draws drives exp() far below f64 range
        let mut source = ReplaySource::new(vec![-3.0; 400]);
        let ensemble = Sampler::new(&stats, cfg).unwrap().run_paths(&mut source);
        let path = &ensemble.paths()[0];
        assert!(path.prices().iter().all(|&p| p > 0.0));
        assert_eq!(path.terminal_price(), Some(F::MIN_POSITIVE));
    }

    #[test]
    #[should_panic(expected = "replay source exhausted")]
    fn test_short_replay_does_not_reuse_draws() {
        let stats = ReturnStatistics::new(0.0, 0.2);
        let cfg = SimulationConfig::new(2, 3, 1.0, 100.0).unwrap();
        let mut source = ReplaySource::new(vec![0.5, -1.0, 2.0]);
        let _ = simulate(&stats, &cfg, &mut source);
    }
}
