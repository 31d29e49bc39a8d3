pub mod error;
pub mod series;
pub mod calibrate;
pub mod config;
pub mod noise;
pub mod path;

// Core types
pub type F = f64;
pub use error::{SimError, Result};
pub use series::{HistoricalSeries, Observation};

// Calibration
pub use calibrate::{calibrate, calibrate_with, returns, ReturnKind, ReturnStatistics, MIN_OBSERVATIONS};

// Simulation inputs and outputs
pub use config::SimulationConfig;
pub use noise::{NoiseGenerator, NormalSource, NormalStreams, ReplaySource, SeededStreams};
pub use path::{PricePath, StepRecord, TracedPath};
