use anyhow::Context;
use gbmsim_core::{ReturnKind, F};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunable knobs of a simulation run.
///
/// Resolved in three layers: built-in defaults, then an optional JSON file,
/// then command-line flags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSettings {
    pub paths: usize,
    pub steps: usize,
    pub dt: F,
    pub seed: u64,
    pub confidence: F,
    pub returns: ReturnKind,
    pub column: String,
    pub skip_rows: usize,
    pub parallel: bool,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            paths: 3,
            steps: 100,
            dt: 1.0 / 252.0,
            seed: 42,
            confidence: 0.95,
            returns: ReturnKind::Simple,
            column: "Close".to_string(),
            skip_rows: 0,
            parallel: false,
        }
    }
}

impl SimulationSettings {
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings {}", path.display()))?;
        let settings = serde_json::from_str(&json)
            .with_context(|| format!("invalid settings in {}", path.display()))?;
        Ok(settings)
    }

    /// Defaults, overlaid by `path` when given.
    pub fn resolve(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings: SimulationSettings =
            serde_json::from_str(r#"{ "paths": 500, "returns": "log" }"#).unwrap();
        assert_eq!(settings.paths, 500);
        assert_eq!(settings.returns, ReturnKind::Log);
        assert_eq!(settings.steps, 100);
        assert_eq!(settings.seed, 42);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<SimulationSettings, _> = serde_json::from_str(r#"{ "pathz": 5 }"#);
        assert!(result.is_err());
    }
}
