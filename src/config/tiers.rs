//! Tier membership table

use crate::classifier::Tier;
use serde::{Deserialize, Serialize};

/// Backends eligible for each tier, in configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierTable {
    pub simple: Vec<String>,
    pub medium: Vec<String>,
    pub complex: Vec<String>,
    /// Appended after a tier's own candidates
    pub fallback: Vec<String>,
}

impl TierTable {
    pub fn backends_for(&self, tier: Tier) -> &[String] {
        match tier {
            Tier::Simple => &self.simple,
            Tier::Medium => &self.medium,
            Tier::Complex => &self.complex,
            Tier::Fallback => &self.fallback,
        }
    }

    /// Iterate `(tier, backend_id)` pairs across the whole table.
    pub fn entries(&self) -> impl Iterator<Item = (Tier, &str)> {
        Tier::ALL.into_iter().flat_map(move |tier| {
            self.backends_for(tier)
                .iter()
                .map(move |id| (tier, id.as_str()))
        })
    }

    /// Tiers a backend belongs to.
    pub fn tiers_of(&self, backend_id: &str) -> Vec<Tier> {
        Tier::ALL
            .into_iter()
            .filter(|tier| self.backends_for(*tier).iter().any(|id| id == backend_id))
            .collect()
    }
}
