//! Severity ordinal and aggregation

use serde::{Deserialize, Serialize};

use crate::analysis::DetectedIssue;

/// Ordinal severity of a dental finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Moderate,
    High,
}

impl Severity {
    /// Numeric score used when averaging (low=1, moderate=2, high=3)
    pub fn score(&self) -> u32 {
        match self {
            Severity::Low => 1,
            Severity::Moderate => 2,
            Severity::High => 3,
        }
    }

    /// Bucket a mean score: below 1.5 is low, below 2.5 moderate, else high
    pub fn from_mean(mean: f64) -> Self {
        if mean < 1.5 {
            Severity::Low
        } else if mean < 2.5 {
            Severity::Moderate
        } else {
            Severity::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Moderate => "moderate",
            Severity::High => "high",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Severity::Low),
            "moderate" => Some(Severity::Moderate),
            "high" => Some(Severity::High),
            _ => None,
        }
    }
}

/// Overall severity of a set of issues. An empty set is low.
pub fn overall_severity(issues: &[DetectedIssue]) -> Severity {
    if issues.is_empty() {
        return Severity::Low;
    }

    let total: u32 = issues.iter().map(|issue| issue.severity.score()).sum();
    Severity::from_mean(total as f64 / issues.len() as f64)
}
