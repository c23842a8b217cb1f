use crate::config::rules::RuleSet;
use anyhow::Context;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Scores at or above this are considered appropriate.
pub const APPROPRIATE_SCORE: f64 = 0.7;
/// Scores at or above this are approved without review.
pub const APPROVE_SCORE: f64 = 0.9;

const TERM_PENALTY: f64 = 0.1;
const HOSTILE_PENALTY: f64 = 0.3;
const SOLICITATION_PENALTY: f64 = 0.2;
const REPETITION_PENALTY: f64 = 0.15;
const CAPS_PENALTY: f64 = 0.1;

const SOLICITATION_KIND_LIMIT: usize = 2;
const REPETITION_MIN_TOKEN_CHARS: usize = 4;
const REPETITION_LIMIT: usize = 3;
const CAPS_MIN_CHARS: usize = 10;
const CAPS_RATIO_LIMIT: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentAnalysis {
    pub is_appropriate: bool,
    pub confidence_score: f64,
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendedAction {
    Approve,
    Flag,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModerationRecommendation {
    pub action: RecommendedAction,
    pub reason: String,
    pub confidence_score: f64,
    pub flags: Vec<String>,
}

/// Heuristic text scorer. Cheap to clone and safe to share across tasks.
#[derive(Debug, Clone)]
pub struct ContentAnalyzer {
    terms: Vec<String>,
    hostile: Vec<Regex>,
    solicitation: Vec<Regex>,
}

impl ContentAnalyzer {
    pub fn new(rules: &RuleSet) -> anyhow::Result<Self> {
        Ok(Self {
            terms: normalize_terms(&rules.disallowed_terms),
            hostile: compile_all(&rules.hostile_patterns)?,
            solicitation: compile_all(&rules.solicitation_patterns)?,
        })
    }

    pub fn with_default_rules() -> Self {
        Self::new(&RuleSet::default()).expect("built-in moderation rules should compile")
    }

    pub fn analyze(&self, text: &str) -> ContentAnalysis {
        if text.trim().is_empty() {
            return ContentAnalysis {
                is_appropriate: true,
                confidence_score: 1.0,
                flags: Vec::new(),
            };
        }

        let mut score = 1.0;
        let mut flags = Vec::new();
        let lowered = text.to_lowercase();

        for term in &self.terms {
            if lowered.contains(term.as_str()) {
                flags.push(format!("Contains inappropriate term: \"{}\"", term));
                score -= TERM_PENALTY;
            }
        }

        for pattern in &self.hostile {
            if let Some(m) = pattern.find(text) {
                flags.push(format!("Contains hostile language: \"{}\"", m.as_str()));
                score -= HOSTILE_PENALTY;
            }
        }

        let solicitation_kinds = self
            .solicitation
            .iter()
            .filter(|p| p.is_match(text))
            .count();
        if solicitation_kinds > SOLICITATION_KIND_LIMIT {
            flags.push(format!(
                "Contains excessive links or contact details ({} kinds)",
                solicitation_kinds
            ));
            score -= SOLICITATION_PENALTY;
        }

        if let Some(word) = repeated_token(&lowered) {
            flags.push(format!("Excessive repetition of \"{}\"", word));
            score -= REPETITION_PENALTY;
        }

        if shouting(text) {
            flags.push("Excessive use of capital letters".to_string());
            score -= CAPS_PENALTY;
        }

        let confidence_score = round_score(score);
        ContentAnalysis {
            is_appropriate: confidence_score >= APPROPRIATE_SCORE,
            confidence_score,
            flags,
        }
    }

    pub fn recommend(&self, text: &str) -> ModerationRecommendation {
        self.analyze(text).into_recommendation()
    }
}

impl ContentAnalysis {
    pub fn recommended_action(&self) -> RecommendedAction {
        if self.confidence_score >= APPROVE_SCORE {
            RecommendedAction::Approve
        } else if self.confidence_score >= APPROPRIATE_SCORE {
            RecommendedAction::Flag
        } else {
            RecommendedAction::Reject
        }
    }

    pub fn into_recommendation(self) -> ModerationRecommendation {
        let action = self.recommended_action();
        let details = self.flags.join("; ");
        let reason = match action {
            RecommendedAction::Approve if self.flags.is_empty() => {
                "Content appears appropriate".to_string()
            }
            RecommendedAction::Approve => format!("Approved with minor concerns: {}", details),
            RecommendedAction::Flag => format!("Flagged for manual review: {}", details),
            RecommendedAction::Reject => format!("Rejected: {}", details),
        };

        ModerationRecommendation {
            action,
            reason,
            confidence_score: self.confidence_score,
            flags: self.flags,
        }
    }
}

/// Terms form a set: trimmed, lower-cased, blanks dropped, first
/// occurrence kept.
fn normalize_terms(terms: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    terms
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

fn compile_all(patterns: &[String]) -> anyhow::Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("Invalid moderation pattern '{}'", p))
        })
        .collect()
}

/// First token (in text order) seen more than `REPETITION_LIMIT` times.
fn repeated_token(lowered: &str) -> Option<&str> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in lowered.split_whitespace() {
        if token.chars().count() < REPETITION_MIN_TOKEN_CHARS {
            continue;
        }
        let count = counts.entry(token).or_insert(0);
        *count += 1;
        if *count > REPETITION_LIMIT {
            return Some(token);
        }
    }
    None
}

fn shouting(text: &str) -> bool {
    if text.chars().count() < CAPS_MIN_CHARS {
        return false;
    }
    let (letters, upper) = text
        .chars()
        .filter(|c| c.is_alphabetic())
        .fold((0usize, 0usize), |(letters, upper), c| {
            (letters + 1, upper + usize::from(c.is_uppercase()))
        });
    if letters == 0 {
        return false;
    }
    (upper as f64 / letters as f64) > CAPS_RATIO_LIMIT
}

// Deductions are decimal; keep threshold comparisons exact.
fn round_score(score: f64) -> f64 {
    (score.clamp(0.0, 1.0) * 10_000.0).round() / 10_000.0
}
