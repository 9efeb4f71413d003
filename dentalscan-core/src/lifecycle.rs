//! Submission status state machine
//!
//! `pending -> analyzing -> completed | failed`. Both terminal states are final.

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Analyzing,
    Completed,
    Failed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Analyzing => "analyzing",
            SubmissionStatus::Completed => "completed",
            SubmissionStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SubmissionStatus::Pending),
            "analyzing" => Some(SubmissionStatus::Analyzing),
            "completed" => Some(SubmissionStatus::Completed),
            "failed" => Some(SubmissionStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionStatus::Completed | SubmissionStatus::Failed)
    }

    pub fn can_transition_to(&self, next: SubmissionStatus) -> bool {
        matches!(
            (self, next),
            (SubmissionStatus::Pending, SubmissionStatus::Analyzing)
                | (SubmissionStatus::Analyzing, SubmissionStatus::Completed)
                | (SubmissionStatus::Analyzing, SubmissionStatus::Failed)
        )
    }

    /// Validate a transition, returning the new status
    pub fn transition(self, next: SubmissionStatus) -> Result<SubmissionStatus, Error> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(Error::InvalidTransition {
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let status = SubmissionStatus::Pending;
        let status = status.transition(SubmissionStatus::Analyzing).unwrap();
        let status = status.transition(SubmissionStatus::Completed).unwrap();
        assert!(status.is_terminal());
    }

    #[test]
    fn test_failure_is_final() {
        let status = SubmissionStatus::Analyzing
            .transition(SubmissionStatus::Failed)
            .unwrap();
        assert!(status.is_terminal());
        assert!(status.transition(SubmissionStatus::Analyzing).is_err());
        assert!(status.transition(SubmissionStatus::Pending).is_err());
    }

    #[test]
    fn test_cannot_skip_analyzing() {
        let result = SubmissionStatus::Pending.transition(SubmissionStatus::Completed);
        assert!(matches!(
            result,
            Err(Error::InvalidTransition { from: "pending", to: "completed" })
        ));
    }
}
