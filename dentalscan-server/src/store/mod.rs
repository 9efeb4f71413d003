//! Storage abstractions for the backend

pub mod memory;
pub mod models;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use models::*;
pub use sqlite::SqliteStore;

use dentalscan_core::SubmissionStatus;

use crate::error::ApiError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, ApiError>;

/// Users and their student profiles
pub trait UserStore: Send + Sync {
    /// Insert or update a user by external identity, refreshing `last_signed_in`
    fn upsert_user(&self, identity: IdentityUpsert) -> StoreResult<User>;

    fn get_user(&self, user_id: UserId) -> StoreResult<Option<User>>;

    fn get_user_by_open_id(&self, open_id: &str) -> StoreResult<Option<User>>;

    fn list_users_by_role(&self, role: Role) -> StoreResult<Vec<User>>;

    /// Number of accounts with the `user` role
    fn count_students(&self) -> StoreResult<u64>;

    /// Create a profile; `Conflict` if the user already has one or the student id is taken
    fn create_profile(&self, profile: NewStudentProfile) -> StoreResult<StudentProfile>;

    fn get_profile(&self, user_id: UserId) -> StoreResult<Option<StudentProfile>>;

    /// Apply a partial update; `None` when the user has no profile
    fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> StoreResult<Option<StudentProfile>>;

    /// `user` accounts joined with their profiles, newest first
    fn list_students(&self, filter: &StudentFilter, page: Page) -> StoreResult<Vec<StudentSummary>>;

    /// Students whose student id contains `query`
    fn search_students(&self, query: &str, page: Page) -> StoreResult<Vec<StudentSummary>>;
}

/// Submissions and their analysis results
pub trait SubmissionStore: Send + Sync {
    /// Insert a submission with status `pending`
    fn create_submission(&self, submission: NewSubmission) -> StoreResult<Submission>;

    fn get_submission(&self, id: SubmissionId) -> StoreResult<Option<Submission>>;

    /// A user's submissions, newest first
    fn list_user_submissions(&self, user_id: UserId, page: Page) -> StoreResult<Vec<Submission>>;

    /// Submissions matching the filter, newest first
    fn filter_submissions(&self, filter: &SubmissionFilter, page: Page)
        -> StoreResult<Vec<Submission>>;

    fn count_submissions(&self) -> StoreResult<u64>;

    /// Move `pending -> analyzing`; `false` if the submission was not pending
    fn begin_analysis(&self, id: SubmissionId) -> StoreResult<bool>;

    fn set_submission_status(&self, id: SubmissionId, status: SubmissionStatus)
        -> StoreResult<()>;

    /// Delete a submission and its analysis result; `false` if it did not exist
    fn delete_submission(&self, id: SubmissionId) -> StoreResult<bool>;

    /// Record an analysis result; `Conflict` if the submission already has one
    fn create_analysis_result(&self, result: NewAnalysisResult) -> StoreResult<AnalysisResult>;

    fn get_analysis_result(&self, submission_id: SubmissionId)
        -> StoreResult<Option<AnalysisResult>>;

    /// Every analysis result, newest first
    fn list_analysis_results(&self) -> StoreResult<Vec<AnalysisResult>>;
}

/// Append-only audit trail, analytics events and email notification records
pub trait AuditStore: Send + Sync {
    fn log_admin_action(&self, log: NewAdminLog) -> StoreResult<AdminLog>;

    /// An admin's own log entries, newest first
    fn list_admin_logs(&self, admin_id: UserId, page: Page) -> StoreResult<Vec<AdminLog>>;

    fn track_event(&self, event: NewAnalyticsEvent) -> StoreResult<AnalyticsEvent>;

    /// Events of one type, oldest first
    fn list_events(&self, event_type: &str) -> StoreResult<Vec<AnalyticsEvent>>;

    /// Insert a notification with status `pending`
    fn create_notification(&self, notification: NewEmailNotification)
        -> StoreResult<EmailNotification>;

    /// Update delivery status; `sent` also stamps `sent_at`
    fn set_notification_status(&self, id: u64, status: NotificationStatus) -> StoreResult<()>;

    /// Notifications addressed to a user, oldest first
    fn list_notifications(&self, user_id: UserId) -> StoreResult<Vec<EmailNotification>>;
}

/// Trait for session storage
pub trait SessionStore: Send + Sync {
    fn create_session(&self, user_id: UserId) -> StoreResult<Session>;

    fn get_session(&self, session_id: &SessionId) -> StoreResult<Option<Session>>;

    fn delete_session(&self, session_id: &SessionId) -> StoreResult<()>;
}

/// Everything the handlers need from persistence
pub trait Store: UserStore + SubmissionStore + AuditStore + SessionStore {}

impl<T> Store for T where T: UserStore + SubmissionStore + AuditStore + SessionStore {}
