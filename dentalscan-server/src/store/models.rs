//! Data models for persistent storage

use chrono::{DateTime, Utc};
use dentalscan_core::{DetectedIssue, Recommendation, Severity, SubmissionStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unique user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

/// Unique submission identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubmissionId(pub u64);

/// Unique session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Self-reported quality of the uploaded photograph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    #[default]
    Good,
    Fair,
    Poor,
}

impl ImageQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageQuality::Good => "good",
            ImageQuality::Fair => "fair",
            ImageQuality::Poor => "poor",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "good" => Some(ImageQuality::Good),
            "fair" => Some(ImageQuality::Fair),
            "poor" => Some(ImageQuality::Poor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    AnalysisComplete,
    CriticalFinding,
    SystemAlert,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::AnalysisComplete => "analysis_complete",
            NotificationType::CriticalFinding => "critical_finding",
            NotificationType::SystemAlert => "system_alert",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "analysis_complete" => Some(NotificationType::AnalysisComplete),
            "critical_finding" => Some(NotificationType::CriticalFinding),
            "system_alert" => Some(NotificationType::SystemAlert),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(NotificationStatus::Pending),
            "sent" => Some(NotificationStatus::Sent),
            "failed" => Some(NotificationStatus::Failed),
            _ => None,
        }
    }
}

/// A signed-in account, keyed by the external identity provider's id
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub open_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub login_method: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_signed_in: DateTime<Utc>,
}

/// Identity fields supplied at sign-in
#[derive(Debug, Clone)]
pub struct IdentityUpsert {
    pub open_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub login_method: Option<String>,
    /// `Some` forces the role; `None` keeps the stored role (or `user` for new accounts)
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub id: u64,
    pub user_id: UserId,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub surname: String,
    pub student_id: String,
    pub age: Option<u32>,
    pub address: Option<String>,
    pub course: Option<String>,
    pub year_level: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudentProfile {
    pub fn full_name(&self) -> String {
        match &self.middle_name {
            Some(middle) if !middle.is_empty() => {
                format!("{} {} {}", self.first_name, middle, self.surname)
            }
            _ => format!("{} {}", self.first_name, self.surname),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewStudentProfile {
    pub user_id: UserId,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub surname: String,
    pub student_id: String,
    pub age: Option<u32>,
    pub address: Option<String>,
    pub course: Option<String>,
    pub year_level: Option<u32>,
}

/// Partial profile update; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub surname: Option<String>,
    pub age: Option<u32>,
    pub address: Option<String>,
    pub course: Option<String>,
    pub year_level: Option<u32>,
}

impl ProfileUpdate {
    pub fn apply(&self, profile: &mut StudentProfile) {
        if let Some(v) = &self.first_name {
            profile.first_name = v.clone();
        }
        if let Some(v) = &self.middle_name {
            profile.middle_name = Some(v.clone());
        }
        if let Some(v) = &self.surname {
            profile.surname = v.clone();
        }
        if let Some(v) = self.age {
            profile.age = Some(v);
        }
        if let Some(v) = &self.address {
            profile.address = Some(v.clone());
        }
        if let Some(v) = &self.course {
            profile.course = Some(v.clone());
        }
        if let Some(v) = self.year_level {
            profile.year_level = Some(v);
        }
    }
}

/// Student listing row: a `user` account joined with its profile, if any
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub id: UserId,
    pub name: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub student_id: Option<String>,
    pub course: Option<String>,
    pub year_level: Option<u32>,
}

impl StudentSummary {
    pub fn from_parts(user: &User, profile: Option<&StudentProfile>) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            created_at: user.created_at,
            student_id: profile.map(|p| p.student_id.clone()),
            course: profile.and_then(|p| p.course.clone()),
            year_level: profile.and_then(|p| p.year_level),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    pub course: Option<String>,
    pub year_level: Option<u32>,
}

impl StudentFilter {
    pub fn matches(&self, summary: &StudentSummary) -> bool {
        if let Some(course) = &self.course {
            if summary.course.as_ref() != Some(course) {
                return false;
            }
        }
        if let Some(year_level) = self.year_level {
            if summary.year_level != Some(year_level) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: SubmissionId,
    pub user_id: UserId,
    pub image_key: String,
    pub image_url: String,
    pub file_name: String,
    pub mime_type: String,
    pub file_size: u64,
    pub image_quality: ImageQuality,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub user_id: UserId,
    pub image_key: String,
    pub image_url: String,
    pub file_name: String,
    pub mime_type: String,
    pub file_size: u64,
    pub image_quality: ImageQuality,
}

/// Admin submission filter; all conditions are ANDed
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionFilter {
    pub user_id: Option<UserId>,
    pub status: Option<SubmissionStatus>,
    /// Matches the overall severity of the submission's analysis result
    pub severity: Option<Severity>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl SubmissionFilter {
    /// Everything except `severity`, which needs the analysis result
    pub fn matches_submission(&self, submission: &Submission) -> bool {
        if let Some(user_id) = self.user_id {
            if submission.user_id != user_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if submission.status != status {
                return false;
            }
        }
        if let Some(start) = self.start_date {
            if submission.created_at < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if submission.created_at > end {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub id: u64,
    pub submission_id: SubmissionId,
    pub user_id: UserId,
    pub detected_issues: Vec<DetectedIssue>,
    pub overall_severity: Severity,
    pub recommendations: Vec<Recommendation>,
    pub disclaimer: String,
    pub model_version: String,
    /// Milliseconds
    pub processing_time: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAnalysisResult {
    pub submission_id: SubmissionId,
    pub user_id: UserId,
    pub detected_issues: Vec<DetectedIssue>,
    pub overall_severity: Severity,
    pub recommendations: Vec<Recommendation>,
    pub disclaimer: String,
    pub model_version: String,
    pub processing_time: u64,
}

/// Audit record of a privileged action
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminLog {
    pub id: u64,
    pub admin_id: UserId,
    pub action: String,
    pub target_user_id: Option<UserId>,
    pub details: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAdminLog {
    pub admin_id: UserId,
    pub action: String,
    pub target_user_id: Option<UserId>,
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub id: u64,
    pub event_type: String,
    pub user_id: Option<UserId>,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAnalyticsEvent {
    pub event_type: String,
    pub user_id: Option<UserId>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailNotification {
    pub id: u64,
    pub user_id: UserId,
    pub submission_id: Option<SubmissionId>,
    pub notification_type: NotificationType,
    pub recipient_email: String,
    pub subject: String,
    pub status: NotificationStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEmailNotification {
    pub user_id: UserId,
    pub submission_id: Option<SubmissionId>,
    pub notification_type: NotificationType,
    pub recipient_email: String,
    pub subject: String,
}

/// A user session
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Limit/offset window for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }

    /// Apply this window to an already-ordered iterator
    pub fn slice<T, I: IntoIterator<Item = T>>(&self, items: I) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect()
    }
}
