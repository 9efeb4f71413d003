//! Aggregate statistics over analysis results

use serde::Serialize;

use crate::analysis::{DetectedIssue, IssueType};
use crate::severity::Severity;

/// Number of issue types reported in `common_issues`
pub const TOP_ISSUES: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityDistribution {
    pub low: u64,
    pub moderate: u64,
    pub high: u64,
}

impl SeverityDistribution {
    fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Low => self.low += 1,
            Severity::Moderate => self.moderate += 1,
            Severity::High => self.high += 1,
        }
    }
}

/// `(issue type, occurrences)`; serialized as a two-element array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IssueCount(pub IssueType, pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStats {
    pub total_analyses: u64,
    pub severity_distribution: SeverityDistribution,
    pub common_issues: Vec<IssueCount>,
}

impl AnalysisStats {
    /// Fold results into statistics. Returns `None` when there are no results.
    pub fn fold<'a, I>(results: I) -> Option<Self>
    where
        I: IntoIterator<Item = (Severity, &'a [DetectedIssue])>,
    {
        let mut total_analyses = 0;
        let mut severity_distribution = SeverityDistribution::default();
        // First-seen order is kept so ties sort deterministically
        let mut counts: Vec<IssueCount> = Vec::new();

        for (severity, issues) in results {
            total_analyses += 1;
            severity_distribution.record(severity);

            for issue in issues {
                match counts.iter_mut().find(|c| c.0 == issue.issue_type) {
                    Some(count) => count.1 += 1,
                    None => counts.push(IssueCount(issue.issue_type, 1)),
                }
            }
        }

        if total_analyses == 0 {
            return None;
        }

        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.truncate(TOP_ISSUES);

        Some(Self {
            total_analyses,
            severity_distribution,
            common_issues: counts,
        })
    }
}
