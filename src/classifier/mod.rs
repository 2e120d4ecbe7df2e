//! Request complexity classification and tier selection.
//!
//! [`analyze`] is a pure function from request text to a [`ComplexityAnalysis`].
//! [`TierPolicy::decide`] turns that analysis into a [`TierDecision`] by walking
//! a fixed-priority cascade of rules; the first rule that matches wins.

use crate::config::ClassifierConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Coarse complexity bucket used to select and order candidate backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Simple,
    Medium,
    Complex,
    /// Never chosen by the cascade; its backends are appended to every candidate list
    Fallback,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Simple, Tier::Medium, Tier::Complex, Tier::Fallback];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Simple => "simple",
            Tier::Medium => "medium",
            Tier::Complex => "complex",
            Tier::Fallback => "fallback",
        }
    }

    /// Position on the simple → complex scale.
    pub fn rank(&self) -> u8 {
        match self {
            Tier::Fallback => 0,
            Tier::Simple => 1,
            Tier::Medium => 2,
            Tier::Complex => 3,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simple" => Ok(Tier::Simple),
            "medium" => Ok(Tier::Medium),
            "complex" => Ok(Tier::Complex),
            "fallback" => Ok(Tier::Fallback),
            _ => Err(format!("Unknown tier: {}", s)),
        }
    }
}

/// Derived, stateless signal computed from request text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplexityAnalysis {
    pub word_count: usize,
    pub line_count: usize,
    pub char_count: usize,
    pub has_code: bool,
    /// Whether any complex-vocabulary keyword matched
    pub has_technical_terms: bool,
    pub score: u32,
    /// Fewer than 10 words
    pub is_very_short: bool,
    /// At least 100 words
    pub is_long: bool,
    /// More than two question marks
    pub has_multiple_questions: bool,
}

const COMPLEX_WEIGHT: i64 = 3;
const FAST_WEIGHT: i64 = 1;
const SIMPLE_WEIGHT: i64 = -1;

const VERY_SHORT_WORDS: usize = 10;
const LONG_WORDS: usize = 100;
const MEDIUM_LENGTH_WORDS: usize = 50;
const MANY_LINES: usize = 10;

const COMPLEX_KEYWORDS: &[&str] = &[
    "analyze",
    "analyse",
    "analise",
    "analisar",
    "architecture",
    "arquitetura",
    "algorithm",
    "algoritmo",
    "optimize",
    "otimizar",
    "otimização",
    "debug",
    "depurar",
    "refactor",
    "refatorar",
    "implement",
    "implementar",
    "performance",
    "desempenho",
    "security",
    "segurança",
    "concurrency",
    "concorrência",
    "distributed",
    "distribuído",
    "scalability",
    "escalabilidade",
    "compare",
    "comparar",
    "strategy",
    "estratégia",
    "database",
    "banco de dados",
    "step by step",
    "passo a passo",
    "explain in detail",
    "explique detalhadamente",
    "trade-off",
    "trade-offs",
];

const FAST_KEYWORDS: &[&str] = &[
    "translate",
    "traduzir",
    "traduza",
    "summarize",
    "resumir",
    "resuma",
    "list",
    "listar",
    "liste",
    "define",
    "definir",
    "convert",
    "converter",
    "format",
    "formatar",
    "quick",
    "rápido",
];

const SIMPLE_KEYWORDS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "olá",
    "oi",
    "thanks",
    "thank you",
    "obrigado",
    "obrigada",
    "ok",
    "yes",
    "no",
    "sim",
    "não",
    "good morning",
    "bom dia",
    "boa tarde",
    "boa noite",
    "tudo bem",
];

static FUNCTION_SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:fn|def|function)\s+\w+\s*[(<]|\bclass\s+\w+\s*[:({]|\)\s*=>")
        .expect("function pattern is valid")
});

static SQL_SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\bSELECT\b[\s\S]+?\bFROM\b|\bINSERT\s+INTO\b|\bCREATE\s+TABLE\b|\bUPDATE\s+\w+\s+SET\b|\bDELETE\s+FROM\b",
    )
    .expect("sql pattern is valid")
});

static IMPORT_SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^\s*(?:import\s+[\w.{*]|from\s+[\w.]+\s+import\b|#include\s*[<"]|use\s+[\w:]+(?:::\{[^}]*\})?\s*;)|\brequire\(\s*['"]"#,
    )
    .expect("import pattern is valid")
});

fn keyword_hits(lowered: &str, words: &HashSet<String>, keywords: &[&str]) -> i64 {
    keywords
        .iter()
        .filter(|kw| {
            if kw.contains(' ') || kw.contains('-') {
                lowered.contains(*kw)
            } else {
                words.contains(**kw)
            }
        })
        .count() as i64
}

/// Analyze request text. Never fails; empty text scores zero.
pub fn analyze(text: &str) -> ComplexityAnalysis {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = text.split_whitespace().collect();
    let word_count = words.len();
    let line_count = text.lines().count();
    let char_count = text.chars().count();

    let tokens: HashSet<String> = lowered
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| !w.is_empty())
        .collect();

    let complex_hits = keyword_hits(&lowered, &tokens, COMPLEX_KEYWORDS);
    let fast_hits = keyword_hits(&lowered, &tokens, FAST_KEYWORDS);
    let simple_hits = keyword_hits(&lowered, &tokens, SIMPLE_KEYWORDS);

    let mut score =
        complex_hits * COMPLEX_WEIGHT + fast_hits * FAST_WEIGHT + simple_hits * SIMPLE_WEIGHT;
    let mut has_code = false;

    if text.contains("```") {
        has_code = true;
        score += 5;
    }
    if FUNCTION_SYNTAX.is_match(text) {
        has_code = true;
        score += 3;
    }
    if SQL_SYNTAX.is_match(text) {
        has_code = true;
        score += 3;
    }
    if IMPORT_SYNTAX.is_match(text) {
        has_code = true;
        score += 2;
    }

    if word_count >= LONG_WORDS {
        score += 2;
    } else if word_count >= MEDIUM_LENGTH_WORDS {
        score += 1;
    }
    if line_count > MANY_LINES {
        score += 1;
    }

    ComplexityAnalysis {
        word_count,
        line_count,
        char_count,
        has_code,
        has_technical_terms: complex_hits > 0,
        score: score.max(0) as u32,
        is_very_short: word_count < VERY_SHORT_WORDS,
        is_long: word_count >= LONG_WORDS,
        has_multiple_questions: text.matches('?').count() > 2,
    }
}

/// Outcome of the tier cascade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierDecision {
    pub tier: Tier,
    /// Human-readable rule that fired
    pub reason: String,
    /// In (0, 1]
    pub confidence: f32,
}

impl TierDecision {
    fn new(tier: Tier, reason: impl Into<String>, confidence: f32) -> Self {
        Self {
            tier,
            reason: reason.into(),
            confidence,
        }
    }
}

/// Deterministic tier cascade over a [`ComplexityAnalysis`].
#[derive(Debug, Clone)]
pub struct TierPolicy {
    complex_threshold: u32,
    moderate_threshold: u32,
    medium_threshold: Option<u32>,
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self::from_config(&ClassifierConfig::default())
    }
}

impl TierPolicy {
    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self {
            complex_threshold: config.complex_threshold,
            moderate_threshold: config.moderate_threshold,
            medium_threshold: config.medium_threshold,
        }
    }

    pub fn decide(&self, analysis: &ComplexityAnalysis) -> TierDecision {
        if analysis.has_code {
            return TierDecision::new(Tier::Complex, "contains code", 0.95);
        }
        if analysis.score >= self.complex_threshold {
            return TierDecision::new(
                Tier::Complex,
                format!(
                    "complexity score {} >= {}",
                    analysis.score, self.complex_threshold
                ),
                0.85,
            );
        }
        if analysis.is_long && analysis.has_technical_terms {
            return TierDecision::new(Tier::Complex, "long text with technical vocabulary", 0.8);
        }
        if analysis.has_multiple_questions && analysis.score >= self.moderate_threshold {
            return TierDecision::new(
                Tier::Complex,
                "multiple questions with moderate complexity",
                0.7,
            );
        }
        if let Some(medium) = self.medium_threshold {
            if analysis.score >= medium {
                return TierDecision::new(
                    Tier::Medium,
                    format!("complexity score {} >= {}", analysis.score, medium),
                    0.65,
                );
            }
        }
        if analysis.is_very_short {
            return TierDecision::new(Tier::Simple, "very short text", 0.9);
        }
        TierDecision::new(Tier::Simple, "default", 0.6)
    }

    /// Analyze and decide in one step.
    pub fn classify(&self, text: &str) -> (ComplexityAnalysis, TierDecision) {
        let analysis = analyze(text);
        let decision = self.decide(&analysis);
        (analysis, decision)
    }
}
