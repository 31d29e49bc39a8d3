pub mod gbm;

pub use gbm::GeometricBrownianMotion;
