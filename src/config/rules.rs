use anyhow::{Context, Result};
use serde::Deserialize;
use std::{env, fs, path::Path};

const DEFAULT_DISALLOWED_TERMS: &[&str] = &[
    "buy now",
    "free money",
    "click here",
    "act now",
    "limited time offer",
    "make money fast",
    "work from home",
    "crypto giveaway",
    "wire transfer",
    "casino",
    "viagra",
];

const DEFAULT_HOSTILE_PATTERNS: &[&str] = &[
    r"\b(kill|hurt|beat)\s+(yourself|you)\b",
    r"\bi\s+hate\s+(you|u)\b",
    r"\byou(\s+are|'re|\s+r)\s+(an?\s+)?(idiot|moron|loser|worthless)\b",
    r"\b(shut\s+up|go\s+die)\b",
];

const DEFAULT_SOLICITATION_PATTERNS: &[&str] = &[
    // links
    r"https?://\S+|www\.\S+",
    // email addresses
    r"[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}",
    // phone numbers
    r"\b\d{3}[-.\s]?\d{3}[-.\s]?\d{4}\b",
];

/// Lookup tables used by the content analyzer.
///
/// Any field missing from a rules file falls back to the built-in list, so a
/// file may override just one table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    /// Case-insensitive substrings.
    pub disallowed_terms: Vec<String>,
    /// Case-insensitive regular expressions.
    pub hostile_patterns: Vec<String>,
    /// Case-insensitive regular expressions for links and contact details.
    pub solicitation_patterns: Vec<String>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            disallowed_terms: to_owned(DEFAULT_DISALLOWED_TERMS),
            hostile_patterns: to_owned(DEFAULT_HOSTILE_PATTERNS),
            solicitation_patterns: to_owned(DEFAULT_SOLICITATION_PATTERNS),
        }
    }
}

impl RuleSet {
    /// Load from `MODERATION_RULES_PATH` when set, otherwise use the defaults.
    pub fn from_env() -> Result<Self> {
        match env::var("MODERATION_RULES_PATH") {
            Ok(path) if !path.trim().is_empty() => Self::load(path.trim()),
            _ => Ok(Self::default()),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules file '{}'", path.display()))?;
        let rules = Self::from_toml_str(&raw)
            .with_context(|| format!("Invalid rules file '{}'", path.display()))?;
        tracing::info!(
            "Loaded moderation rules from {} ({} terms, {} hostile, {} solicitation)",
            path.display(),
            rules.disallowed_terms.len(),
            rules.hostile_patterns.len(),
            rules.solicitation_patterns.len()
        );
        Ok(rules)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut rules: RuleSet = toml::from_str(raw)?;
        // Terms are matched against lower-cased text.
        rules.disallowed_terms = rules
            .disallowed_terms
            .into_iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Ok(rules)
    }
}

fn to_owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
