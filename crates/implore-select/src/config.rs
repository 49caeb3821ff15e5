//! Evaluator configuration

use serde::{Deserialize, Serialize};

/// When bracketed sub-selections are materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceResolution {
    /// On first use by a proximity predicate
    #[default]
    Lazy,
    /// During evaluator construction
    Eager,
}

/// Configuration for evaluator construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    pub reference_resolution: ReferenceResolution,
    /// Compare names and text attributes case-sensitively
    pub case_sensitive_names: bool,
    /// Absolute tolerance for numeric `Eq`/`Ne` (default: 1e-10)
    pub float_tolerance: f64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            reference_resolution: ReferenceResolution::Lazy,
            case_sensitive_names: true,
            float_tolerance: 1e-10,
        }
    }
}

impl EvaluatorConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Same configuration with eager reference resolution
    pub fn eager(mut self) -> Self {
        self.reference_resolution = ReferenceResolution::Eager;
        self
    }
}
