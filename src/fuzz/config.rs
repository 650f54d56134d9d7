//! Fuzz run configuration.

use serde::{Deserialize, Serialize};

/// Which sequence implementation a fuzz run drives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum Implementation {
    /// RGA over characters.
    #[default]
    Rga,
    /// RGA operations executed through the GOT control algorithm.
    RgaOt,
    /// RGA over labeled elements whose identity is separate from their value.
    Labeled,
}

/// Parameters of [`run_iterated`](super::run_iterated).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzConfig {
    /// Number of scenarios to run.
    pub iterations: usize,
    /// Operation slots per scenario.
    pub slots: usize,
    /// Elements per random insertion.
    pub insert_len: usize,
    /// Chance that a random edit on a non-empty document is a deletion.
    pub delete_probability: f64,
    /// Seed string from a previous run's report, or `None` for entropy.
    pub seed: Option<String>,
    /// Implementation under test.
    pub implementation: Implementation,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        return FuzzConfig {
            iterations: 10_000,
            slots: 20,
            insert_len: 3,
            delete_probability: 0.3,
            seed: None,
            implementation: Implementation::Rga,
        };
    }
}
