//! Output formatting helpers for CLI commands

use crate::classifier::{ComplexityAnalysis, Tier, TierDecision};
use crate::config::{BackendConfig, SwitchyardConfig};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::Serialize;
use serde_json::json;

/// View model for backend display
#[derive(Debug, Clone, Serialize)]
pub struct BackendView {
    pub id: String,
    pub protocol: String,
    pub url: String,
    pub model: String,
    pub cost_per_unit: f64,
    pub tiers: Vec<Tier>,
    pub timeout_ms: u64,
    pub failure_threshold: u32,
}

impl BackendView {
    pub fn new(backend: &BackendConfig, config: &SwitchyardConfig) -> Self {
        let breaker = config.breaker.resolve(backend);
        Self {
            id: backend.id.clone(),
            protocol: backend.protocol.to_string(),
            url: backend.url.clone(),
            model: backend.model.clone(),
            cost_per_unit: backend.cost_per_unit,
            tiers: config.tiers.tiers_of(&backend.id),
            timeout_ms: breaker.timeout.as_millis() as u64,
            failure_threshold: breaker.failure_threshold,
        }
    }
}

/// Tier name colored by cost class.
pub fn colored_tier(tier: Tier) -> String {
    match tier {
        Tier::Simple => tier.as_str().green().to_string(),
        Tier::Medium => tier.as_str().yellow().to_string(),
        Tier::Complex => tier.as_str().red().to_string(),
        Tier::Fallback => tier.as_str().cyan().to_string(),
    }
}

/// Format backends as a table
pub fn format_backends_table(backends: &[BackendView]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "ID", "Protocol", "Model", "URL", "Cost", "Tiers", "Timeout", "Threshold",
    ]);

    for b in backends {
        let tiers = if b.tiers.is_empty() {
            "-".dimmed().to_string()
        } else {
            b.tiers
                .iter()
                .map(|t| colored_tier(*t))
                .collect::<Vec<_>>()
                .join(", ")
        };

        table.add_row(vec![
            Cell::new(&b.id),
            Cell::new(&b.protocol),
            Cell::new(&b.model),
            Cell::new(&b.url),
            Cell::new(format!("{:.2}", b.cost_per_unit)),
            Cell::new(tiers),
            Cell::new(format!("{}ms", b.timeout_ms)),
            Cell::new(b.failure_threshold),
        ]);
    }

    table.to_string()
}

/// Format backends as JSON
pub fn format_backends_json(backends: &[BackendView]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&json!({ "backends": backends }))
}

/// Format a classification as a two-column table
pub fn format_classification_table(analysis: &ComplexityAnalysis, decision: &TierDecision) -> String {
    let yes_no = |flag: bool| if flag { "yes" } else { "no" };

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Signal", "Value"]);
    table.add_row(vec![Cell::new("Tier"), Cell::new(colored_tier(decision.tier))]);
    table.add_row(vec![Cell::new("Reason"), Cell::new(&decision.reason)]);
    table.add_row(vec![
        Cell::new("Confidence"),
        Cell::new(format!("{:.2}", decision.confidence)),
    ]);
    table.add_row(vec![Cell::new("Score"), Cell::new(analysis.score)]);
    table.add_row(vec![Cell::new("Words"), Cell::new(analysis.word_count)]);
    table.add_row(vec![Cell::new("Lines"), Cell::new(analysis.line_count)]);
    table.add_row(vec![Cell::new("Chars"), Cell::new(analysis.char_count)]);
    table.add_row(vec![Cell::new("Code"), Cell::new(yes_no(analysis.has_code))]);
    table.add_row(vec![
        Cell::new("Technical terms"),
        Cell::new(yes_no(analysis.has_technical_terms)),
    ]);
    table.add_row(vec![Cell::new("Very short"), Cell::new(yes_no(analysis.is_very_short))]);
    table.add_row(vec![Cell::new("Long"), Cell::new(yes_no(analysis.is_long))]);
    table.add_row(vec![
        Cell::new("Multiple questions"),
        Cell::new(yes_no(analysis.has_multiple_questions)),
    ]);

    table.to_string()
}

/// Format a classification as JSON
pub fn format_classification_json(
    analysis: &ComplexityAnalysis,
    decision: &TierDecision,
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&json!({
        "tier": decision.tier,
        "reason": decision.reason,
        "confidence": decision.confidence,
        "analysis": analysis,
    }))
}
