//! Classifier thresholds

use serde::{Deserialize, Serialize};

/// Thresholds driving the tier cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Score at or above which a request goes to the complex tier
    pub complex_threshold: u32,
    /// Score required, together with several questions, for the complex tier
    pub moderate_threshold: u32,
    /// When set, scores at or above this value route to the medium tier
    pub medium_threshold: Option<u32>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            complex_threshold: 6,
            moderate_threshold: 3,
            medium_threshold: None,
        }
    }
}
