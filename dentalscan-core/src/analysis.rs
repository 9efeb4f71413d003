//! Mock dental image analyzer
//!
//! Stands in for a trained classifier. The analyzer has no model behind it:
//! it samples a processing delay and a randomized set of findings with fixed
//! statistics so a real model can later be swapped in behind the same contract.

use std::collections::HashSet;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::severity::{overall_severity, Severity};

/// Version string recorded with every generated report
pub const MODEL_VERSION: &str = "v1.0.2";

/// Disclaimer stored alongside every analysis result
pub const DISCLAIMER: &str = "This analysis is not a medical diagnosis and should not replace a \
    licensed dentist. Please consult with a dental professional for proper diagnosis and \
    treatment recommendations.";

/// Category of a detected dental finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    Cavity,
    Decay,
    Crack,
    Plaque,
    Inflammation,
    Healthy,
}

impl IssueType {
    pub const ALL: [IssueType; 6] = [
        IssueType::Cavity,
        IssueType::Decay,
        IssueType::Crack,
        IssueType::Plaque,
        IssueType::Inflammation,
        IssueType::Healthy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Cavity => "cavity",
            IssueType::Decay => "decay",
            IssueType::Crack => "crack",
            IssueType::Plaque => "plaque",
            IssueType::Inflammation => "inflammation",
            IssueType::Healthy => "healthy",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            IssueType::Cavity => {
                "A small hole or pit in the tooth structure, typically caused by bacterial acid"
            }
            IssueType::Decay => {
                "Tooth decay or caries, indicating demineralization of tooth structure"
            }
            IssueType::Crack => "A visible crack or fracture in the tooth surface",
            IssueType::Plaque => "Buildup of bacterial plaque on tooth surface",
            IssueType::Inflammation => "Gum inflammation or gingivitis visible around the tooth",
            IssueType::Healthy => {
                "Tooth appears to be in healthy condition with no visible issues"
            }
        }
    }

    /// Static care recommendations for this issue type
    pub fn recommendations(&self) -> &'static [(&'static str, &'static str, Priority)] {
        match self {
            IssueType::Cavity => &[
                (
                    "Schedule Dental Appointment",
                    "Visit a dentist for professional treatment. Early cavities can be treated with fillings.",
                    Priority::High,
                ),
                (
                    "Improve Oral Hygiene",
                    "Brush twice daily with fluoride toothpaste and floss regularly",
                    Priority::High,
                ),
                (
                    "Reduce Sugar Intake",
                    "Limit sugary foods and drinks that feed cavity-causing bacteria",
                    Priority::Medium,
                ),
            ],
            IssueType::Decay => &[
                (
                    "Urgent Dental Care",
                    "Tooth decay requires professional treatment. Schedule an appointment immediately.",
                    Priority::High,
                ),
                (
                    "Fluoride Treatment",
                    "Ask your dentist about fluoride treatments to strengthen remaining tooth structure",
                    Priority::High,
                ),
                (
                    "Pain Management",
                    "Use over-the-counter pain relievers if experiencing discomfort",
                    Priority::Medium,
                ),
            ],
            IssueType::Crack => &[
                (
                    "Dental Evaluation",
                    "A dentist needs to assess the crack severity and recommend treatment",
                    Priority::High,
                ),
                (
                    "Avoid Hard Foods",
                    "Avoid chewing hard foods or ice to prevent worsening the crack",
                    Priority::High,
                ),
                (
                    "Protective Measures",
                    "Consider a night guard if grinding is causing the crack",
                    Priority::Medium,
                ),
            ],
            IssueType::Plaque => &[
                (
                    "Professional Cleaning",
                    "Schedule a professional cleaning with your dentist or hygienist",
                    Priority::Medium,
                ),
                (
                    "Enhanced Brushing",
                    "Brush for 2 minutes twice daily, paying special attention to plaque buildup areas",
                    Priority::Medium,
                ),
                (
                    "Daily Flossing",
                    "Floss daily to remove plaque between teeth where brushing cannot reach",
                    Priority::Medium,
                ),
            ],
            IssueType::Inflammation => &[
                (
                    "Gum Care",
                    "Use an antimicrobial mouthwash and improve brushing technique",
                    Priority::Medium,
                ),
                (
                    "Professional Cleaning",
                    "Schedule a professional cleaning to remove tartar and plaque",
                    Priority::Medium,
                ),
                (
                    "Monitor Symptoms",
                    "Watch for bleeding, swelling, or pain and seek dental care if worsening",
                    Priority::Low,
                ),
            ],
            IssueType::Healthy => &[
                (
                    "Maintain Current Routine",
                    "Continue your current oral hygiene practices",
                    Priority::Low,
                ),
                (
                    "Regular Checkups",
                    "Visit your dentist every 6 months for preventive care",
                    Priority::Low,
                ),
                (
                    "Healthy Habits",
                    "Maintain a balanced diet and avoid tobacco and excessive sugar",
                    Priority::Low,
                ),
            ],
        }
    }
}

/// Recommendation priority, ordered most urgent first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// A single finding on the image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedIssue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    /// `tooth_N` (1-32) or `overall`
    pub location: String,
    pub severity: Severity,
    /// In [0.6, 1.0)
    pub confidence: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    pub priority: Priority,
}

/// Output of one analyzer run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub detected_issues: Vec<DetectedIssue>,
    pub overall_severity: Severity,
    pub recommendations: Vec<Recommendation>,
    pub model_version: String,
}

/// Randomized placeholder for the dental image classifier
#[derive(Debug, Clone)]
pub struct MockAnalyzer {
    min_delay: Duration,
    max_delay: Duration,
}

impl MockAnalyzer {
    /// Analyzer with the standard 2-5 second processing delay
    pub fn new() -> Self {
        Self::with_delay(Duration::from_secs(2), Duration::from_secs(5))
    }

    /// Analyzer with a custom delay range (`min == max` gives a fixed delay)
    pub fn with_delay(min_delay: Duration, max_delay: Duration) -> Self {
        let (min_delay, max_delay) = if min_delay <= max_delay {
            (min_delay, max_delay)
        } else {
            (max_delay, min_delay)
        };
        Self { min_delay, max_delay }
    }

    /// Analyzer that responds immediately
    pub fn instant() -> Self {
        Self::with_delay(Duration::ZERO, Duration::ZERO)
    }

    /// Sample how long this run should appear to take
    pub fn sample_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min_delay == self.max_delay {
            return self.min_delay;
        }
        rng.gen_range(self.min_delay..self.max_delay)
    }

    /// Generate a randomized report
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> AnalysisReport {
        let mut detected_issues = Vec::new();

        if rng.gen_bool(0.7) {
            let count = rng.gen_range(1..=3);
            for _ in 0..count {
                let issue_type = IssueType::ALL[rng.gen_range(0..IssueType::ALL.len())];
                let tooth: u32 = rng.gen_range(1..=32);
                detected_issues.push(DetectedIssue {
                    issue_type,
                    location: format!("tooth_{}", tooth),
                    severity: random_severity(rng),
                    confidence: rng.gen_range(0.6..1.0),
                    description: issue_type.description().to_string(),
                });
            }
        } else {
            detected_issues.push(DetectedIssue {
                issue_type: IssueType::Healthy,
                location: "overall".to_string(),
                severity: Severity::Low,
                confidence: 0.95,
                description: IssueType::Healthy.description().to_string(),
            });
        }

        let overall_severity = overall_severity(&detected_issues);
        let recommendations = recommendations_for(&detected_issues);

        AnalysisReport {
            detected_issues,
            overall_severity,
            recommendations,
            model_version: MODEL_VERSION.to_string(),
        }
    }
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// 50% low, 30% moderate, 20% high
fn random_severity<R: Rng + ?Sized>(rng: &mut R) -> Severity {
    let roll: f64 = rng.gen();
    if roll < 0.5 {
        Severity::Low
    } else if roll < 0.8 {
        Severity::Moderate
    } else {
        Severity::High
    }
}

/// Recommendations for a set of issues, unique by title, most urgent first
pub fn recommendations_for(issues: &[DetectedIssue]) -> Vec<Recommendation> {
    let mut seen = HashSet::new();
    let mut recommendations = Vec::new();

    for issue in issues {
        for (title, description, priority) in issue.issue_type.recommendations() {
            if seen.insert(*title) {
                recommendations.push(Recommendation {
                    title: title.to_string(),
                    description: description.to_string(),
                    priority: *priority,
                });
            }
        }
    }

    // Stable: equal priorities keep first-seen order
    recommendations.sort_by_key(|r| r.priority);
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn issue(issue_type: IssueType, severity: Severity) -> DetectedIssue {
        DetectedIssue {
            issue_type,
            location: "tooth_3".to_string(),
            severity,
            confidence: 0.7,
            description: issue_type.description().to_string(),
        }
    }

    #[test]
    fn test_generated_reports_respect_bounds() {
        let analyzer = MockAnalyzer::instant();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..500 {
            let report = analyzer.generate(&mut rng);
            assert!(!report.detected_issues.is_empty());
            assert!(report.detected_issues.len() <= 3);
            assert_eq!(report.model_version, MODEL_VERSION);
            assert_eq!(report.overall_severity, overall_severity(&report.detected_issues));

            for issue in &report.detected_issues {
                assert!(issue.confidence >= 0.6 && issue.confidence < 1.0);
                assert_eq!(issue.description, issue.issue_type.description());
                if issue.location != "overall" {
                    let tooth: u32 = issue.location.trim_start_matches("tooth_").parse().unwrap();
                    assert!((1..=32).contains(&tooth));
                }
            }
        }
    }

    #[test]
    fn test_healthy_fallback_shape() {
        let analyzer = MockAnalyzer::instant();
        let mut rng = StdRng::seed_from_u64(42);

        let healthy = (0..500)
            .map(|_| analyzer.generate(&mut rng))
            .find(|r| r.detected_issues[0].location == "overall")
            .expect("expected at least one no-findings report");

        assert_eq!(healthy.detected_issues.len(), 1);
        assert_eq!(healthy.detected_issues[0].issue_type, IssueType::Healthy);
        assert_eq!(healthy.detected_issues[0].confidence, 0.95);
        assert_eq!(healthy.overall_severity, Severity::Low);
    }

    #[test]
    fn test_recommendations_deduplicated_and_sorted() {
        // Plaque and inflammation both recommend "Professional Cleaning"
        let issues = vec![
            issue(IssueType::Inflammation, Severity::Low),
            issue(IssueType::Plaque, Severity::Low),
            issue(IssueType::Cavity, Severity::High),
        ];
        let recs = recommendations_for(&issues);

        let titles: Vec<&str> = recs.iter().map(|r| r.title.as_str()).collect();
        let unique: HashSet<&str> = titles.iter().copied().collect();
        assert_eq!(titles.len(), unique.len());
        assert_eq!(titles.len(), 8);

        assert!(recs.windows(2).all(|w| w[0].priority <= w[1].priority));
        assert_eq!(recs[0].title, "Schedule Dental Appointment");
        assert_eq!(recs.last().unwrap().title, "Monitor Symptoms");
    }

    #[test]
    fn test_equal_priorities_keep_first_seen_order() {
        let recs = recommendations_for(&[issue(IssueType::Healthy, Severity::Low)]);
        let titles: Vec<&str> = recs.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Maintain Current Routine", "Regular Checkups", "Healthy Habits"]
        );
    }

    #[test]
    fn test_delay_within_range() {
        let analyzer = MockAnalyzer::new();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let delay = analyzer.sample_delay(&mut rng);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay < Duration::from_secs(5));
        }
        assert_eq!(MockAnalyzer::instant().sample_delay(&mut rng), Duration::ZERO);
    }

    #[test]
    fn test_severity_distribution_roughly_matches() {
        let mut rng = StdRng::seed_from_u64(99);
        let samples = 10_000;
        let high = (0..samples)
            .filter(|_| random_severity(&mut rng) == Severity::High)
            .count();
        let ratio = high as f64 / samples as f64;
        assert!((0.17..0.23).contains(&ratio), "high ratio was {}", ratio);
    }

    #[test]
    fn test_issue_serializes_with_type_key() {
        let json = serde_json::to_value(issue(IssueType::Crack, Severity::Moderate)).unwrap();
        assert_eq!(json["type"], "crack");
        assert_eq!(json["severity"], "moderate");
    }
}
