//! In-memory storage implementation

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use dentalscan_core::SubmissionStatus;
use uuid::Uuid;

use super::{
    AdminLog, AnalysisResult, AnalyticsEvent, AuditStore, EmailNotification, IdentityUpsert,
    NewAdminLog, NewAnalysisResult, NewAnalyticsEvent, NewEmailNotification, NewStudentProfile,
    NewSubmission, NotificationStatus, Page, ProfileUpdate, Role, Session, SessionId,
    SessionStore, StoreResult, StudentFilter, StudentProfile, StudentSummary, Submission,
    SubmissionFilter, SubmissionId, SubmissionStore, User, UserId, UserStore,
};
use crate::error::ApiError;

#[derive(Default)]
struct Tables {
    users: BTreeMap<u64, User>,
    /// Keyed by owning user id
    profiles: HashMap<UserId, StudentProfile>,
    submissions: BTreeMap<u64, Submission>,
    /// Keyed by submission id
    results: HashMap<SubmissionId, AnalysisResult>,
    admin_logs: Vec<AdminLog>,
    events: Vec<AnalyticsEvent>,
    notifications: Vec<EmailNotification>,
    sessions: HashMap<SessionId, Session>,
    last_user_id: u64,
    last_profile_id: u64,
    last_submission_id: u64,
    last_result_id: u64,
    last_log_id: u64,
    last_event_id: u64,
    last_notification_id: u64,
}

fn next_id(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

/// In-memory store implementing every storage trait
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| ApiError::Internal("store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| ApiError::Internal("store lock poisoned".to_string()))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Tables {
    /// `user` accounts joined with profiles, newest first
    fn students(&self) -> impl Iterator<Item = StudentSummary> + '_ {
        self.users
            .values()
            .rev()
            .filter(|u| u.role == Role::User)
            .map(|u| StudentSummary::from_parts(u, self.profiles.get(&u.id)))
    }
}

impl UserStore for InMemoryStore {
    fn upsert_user(&self, identity: IdentityUpsert) -> StoreResult<User> {
        let mut tables = self.write()?;
        let now = Utc::now();

        let existing = tables
            .users
            .values_mut()
            .find(|u| u.open_id == identity.open_id);

        if let Some(user) = existing {
            if identity.name.is_some() {
                user.name = identity.name;
            }
            if identity.email.is_some() {
                user.email = identity.email;
            }
            if identity.login_method.is_some() {
                user.login_method = identity.login_method;
            }
            if let Some(role) = identity.role {
                user.role = role;
            }
            user.last_signed_in = now;
            user.updated_at = now;
            return Ok(user.clone());
        }

        let id = next_id(&mut tables.last_user_id);
        let user = User {
            id: UserId(id),
            open_id: identity.open_id,
            name: identity.name,
            email: identity.email,
            login_method: identity.login_method,
            role: identity.role.unwrap_or(Role::User),
            created_at: now,
            updated_at: now,
            last_signed_in: now,
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    fn get_user(&self, user_id: UserId) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(&user_id.0).cloned())
    }

    fn get_user_by_open_id(&self, open_id: &str) -> StoreResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.open_id == open_id)
            .cloned())
    }

    fn list_users_by_role(&self, role: Role) -> StoreResult<Vec<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .filter(|u| u.role == role)
            .cloned()
            .collect())
    }

    fn count_students(&self) -> StoreResult<u64> {
        Ok(self
            .read()?
            .users
            .values()
            .filter(|u| u.role == Role::User)
            .count() as u64)
    }

    fn create_profile(&self, profile: NewStudentProfile) -> StoreResult<StudentProfile> {
        let mut tables = self.write()?;

        if tables.profiles.contains_key(&profile.user_id) {
            return Err(ApiError::Conflict("Profile already exists".to_string()));
        }
        if tables
            .profiles
            .values()
            .any(|p| p.student_id == profile.student_id)
        {
            return Err(ApiError::Conflict("Student ID already registered".to_string()));
        }

        let now = Utc::now();
        let created = StudentProfile {
            id: next_id(&mut tables.last_profile_id),
            user_id: profile.user_id,
            first_name: profile.first_name,
            middle_name: profile.middle_name,
            surname: profile.surname,
            student_id: profile.student_id,
            age: profile.age,
            address: profile.address,
            course: profile.course,
            year_level: profile.year_level,
            created_at: now,
            updated_at: now,
        };
        tables.profiles.insert(created.user_id, created.clone());
        Ok(created)
    }

    fn get_profile(&self, user_id: UserId) -> StoreResult<Option<StudentProfile>> {
        Ok(self.read()?.profiles.get(&user_id).cloned())
    }

    fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> StoreResult<Option<StudentProfile>> {
        let mut tables = self.write()?;
        Ok(tables.profiles.get_mut(&user_id).map(|profile| {
            update.apply(profile);
            profile.updated_at = Utc::now();
            profile.clone()
        }))
    }

    fn list_students(
        &self,
        filter: &StudentFilter,
        page: Page,
    ) -> StoreResult<Vec<StudentSummary>> {
        let tables = self.read()?;
        Ok(page.slice(tables.students().filter(|s| filter.matches(s))))
    }

    fn search_students(&self, query: &str, page: Page) -> StoreResult<Vec<StudentSummary>> {
        let tables = self.read()?;
        Ok(page.slice(tables.students().filter(|s| {
            s.student_id
                .as_deref()
                .is_some_and(|id| id.to_lowercase().contains(&query.to_lowercase()))
        })))
    }
}

impl SubmissionStore for InMemoryStore {
    fn create_submission(&self, submission: NewSubmission) -> StoreResult<Submission> {
        let mut tables = self.write()?;
        let now = Utc::now();
        let id = next_id(&mut tables.last_submission_id);

        let created = Submission {
            id: SubmissionId(id),
            user_id: submission.user_id,
            image_key: submission.image_key,
            image_url: submission.image_url,
            file_name: submission.file_name,
            mime_type: submission.mime_type,
            file_size: submission.file_size,
            image_quality: submission.image_quality,
            status: SubmissionStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        tables.submissions.insert(id, created.clone());
        Ok(created)
    }

    fn get_submission(&self, id: SubmissionId) -> StoreResult<Option<Submission>> {
        Ok(self.read()?.submissions.get(&id.0).cloned())
    }

    fn list_user_submissions(&self, user_id: UserId, page: Page) -> StoreResult<Vec<Submission>> {
        let tables = self.read()?;
        Ok(page.slice(
            tables
                .submissions
                .values()
                .rev()
                .filter(|s| s.user_id == user_id)
                .cloned(),
        ))
    }

    fn filter_submissions(
        &self,
        filter: &SubmissionFilter,
        page: Page,
    ) -> StoreResult<Vec<Submission>> {
        let tables = self.read()?;
        Ok(page.slice(
            tables
                .submissions
                .values()
                .rev()
                .filter(|s| filter.matches_submission(s))
                .filter(|s| match filter.severity {
                    Some(severity) => tables
                        .results
                        .get(&s.id)
                        .is_some_and(|r| r.overall_severity == severity),
                    None => true,
                })
                .cloned(),
        ))
    }

    fn count_submissions(&self) -> StoreResult<u64> {
        Ok(self.read()?.submissions.len() as u64)
    }

    fn begin_analysis(&self, id: SubmissionId) -> StoreResult<bool> {
        let mut tables = self.write()?;
        match tables.submissions.get_mut(&id.0) {
            Some(submission) if submission.status == SubmissionStatus::Pending => {
                submission.status = SubmissionStatus::Analyzing;
                submission.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn set_submission_status(&self, id: SubmissionId, status: SubmissionStatus) -> StoreResult<()> {
        let mut tables = self.write()?;
        let submission = tables
            .submissions
            .get_mut(&id.0)
            .ok_or_else(ApiError::not_found)?;
        submission.status = status;
        submission.updated_at = Utc::now();
        Ok(())
    }

    fn delete_submission(&self, id: SubmissionId) -> StoreResult<bool> {
        let mut tables = self.write()?;
        tables.results.remove(&id);
        Ok(tables.submissions.remove(&id.0).is_some())
    }

    fn create_analysis_result(&self, result: NewAnalysisResult) -> StoreResult<AnalysisResult> {
        let mut tables = self.write()?;

        if !tables.submissions.contains_key(&result.submission_id.0) {
            return Err(ApiError::not_found());
        }
        if tables.results.contains_key(&result.submission_id) {
            return Err(ApiError::Conflict(
                "Submission already has an analysis result".to_string(),
            ));
        }

        let created = AnalysisResult {
            id: next_id(&mut tables.last_result_id),
            submission_id: result.submission_id,
            user_id: result.user_id,
            detected_issues: result.detected_issues,
            overall_severity: result.overall_severity,
            recommendations: result.recommendations,
            disclaimer: result.disclaimer,
            model_version: result.model_version,
            processing_time: result.processing_time,
            created_at: Utc::now(),
        };
        tables.results.insert(created.submission_id, created.clone());
        Ok(created)
    }

    fn get_analysis_result(
        &self,
        submission_id: SubmissionId,
    ) -> StoreResult<Option<AnalysisResult>> {
        Ok(self.read()?.results.get(&submission_id).cloned())
    }

    fn list_analysis_results(&self) -> StoreResult<Vec<AnalysisResult>> {
        let mut results: Vec<AnalysisResult> = self.read()?.results.values().cloned().collect();
        results.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(results)
    }
}

impl AuditStore for InMemoryStore {
    fn log_admin_action(&self, log: NewAdminLog) -> StoreResult<AdminLog> {
        let mut tables = self.write()?;
        let entry = AdminLog {
            id: next_id(&mut tables.last_log_id),
            admin_id: log.admin_id,
            action: log.action,
            target_user_id: log.target_user_id,
            details: log.details,
            created_at: Utc::now(),
        };
        tables.admin_logs.push(entry.clone());
        Ok(entry)
    }

    fn list_admin_logs(&self, admin_id: UserId, page: Page) -> StoreResult<Vec<AdminLog>> {
        let tables = self.read()?;
        Ok(page.slice(
            tables
                .admin_logs
                .iter()
                .rev()
                .filter(|l| l.admin_id == admin_id)
                .cloned(),
        ))
    }

    fn track_event(&self, event: NewAnalyticsEvent) -> StoreResult<AnalyticsEvent> {
        let mut tables = self.write()?;
        let entry = AnalyticsEvent {
            id: next_id(&mut tables.last_event_id),
            event_type: event.event_type,
            user_id: event.user_id,
            metadata: event.metadata,
            created_at: Utc::now(),
        };
        tables.events.push(entry.clone());
        Ok(entry)
    }

    fn list_events(&self, event_type: &str) -> StoreResult<Vec<AnalyticsEvent>> {
        Ok(self
            .read()?
            .events
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect())
    }

    fn create_notification(
        &self,
        notification: NewEmailNotification,
    ) -> StoreResult<EmailNotification> {
        let mut tables = self.write()?;
        let entry = EmailNotification {
            id: next_id(&mut tables.last_notification_id),
            user_id: notification.user_id,
            submission_id: notification.submission_id,
            notification_type: notification.notification_type,
            recipient_email: notification.recipient_email,
            subject: notification.subject,
            status: NotificationStatus::Pending,
            sent_at: None,
            created_at: Utc::now(),
        };
        tables.notifications.push(entry.clone());
        Ok(entry)
    }

    fn set_notification_status(&self, id: u64, status: NotificationStatus) -> StoreResult<()> {
        let mut tables = self.write()?;
        let notification = tables
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(ApiError::not_found)?;
        notification.status = status;
        if status == NotificationStatus::Sent {
            notification.sent_at = Some(Utc::now());
        }
        Ok(())
    }

    fn list_notifications(&self, user_id: UserId) -> StoreResult<Vec<EmailNotification>> {
        Ok(self
            .read()?
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }
}

impl SessionStore for InMemoryStore {
    fn create_session(&self, user_id: UserId) -> StoreResult<Session> {
        let session = Session {
            id: SessionId(Uuid::new_v4().to_string()),
            user_id,
            created_at: Utc::now(),
        };
        self.write()?
            .sessions
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    fn get_session(&self, session_id: &SessionId) -> StoreResult<Option<Session>> {
        Ok(self.read()?.sessions.get(session_id).cloned())
    }

    fn delete_session(&self, session_id: &SessionId) -> StoreResult<()> {
        self.write()?.sessions.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(open_id: &str) -> IdentityUpsert {
        IdentityUpsert {
            open_id: open_id.to_string(),
            name: Some("Test".to_string()),
            email: Some(format!("{}@example.com", open_id)),
            login_method: None,
            role: None,
        }
    }

    fn profile(user_id: UserId, student_id: &str) -> NewStudentProfile {
        NewStudentProfile {
            user_id,
            first_name: "John".to_string(),
            middle_name: None,
            surname: "Doe".to_string(),
            student_id: student_id.to_string(),
            age: Some(20),
            address: None,
            course: Some("Dentistry".to_string()),
            year_level: Some(2),
        }
    }

    fn submission(user_id: UserId) -> NewSubmission {
        NewSubmission {
            user_id,
            image_key: "submissions/1/1-a.jpg".to_string(),
            image_url: "http://localhost/files/submissions/1/1-a.jpg".to_string(),
            file_name: "a.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            file_size: 1024,
            image_quality: Default::default(),
        }
    }

    #[test]
    fn test_upsert_keeps_identity_and_role() {
        let store = InMemoryStore::new();

        let first = store.upsert_user(identity("abc")).unwrap();
        assert_eq!(first.role, Role::User);

        let promoted = store
            .upsert_user(IdentityUpsert {
                role: Some(Role::Admin),
                name: None,
                ..identity("abc")
            })
            .unwrap();
        assert_eq!(promoted.id, first.id);
        assert_eq!(promoted.role, Role::Admin);
        assert_eq!(promoted.name.as_deref(), Some("Test"));

        // A later sign-in without a role keeps the admin role
        let again = store.upsert_user(identity("abc")).unwrap();
        assert_eq!(again.role, Role::Admin);
    }

    #[test]
    fn test_profile_uniqueness() {
        let store = InMemoryStore::new();
        let a = store.upsert_user(identity("a")).unwrap();
        let b = store.upsert_user(identity("b")).unwrap();

        store.create_profile(profile(a.id, "STU-1")).unwrap();

        let dup_user = store.create_profile(profile(a.id, "STU-2"));
        assert!(matches!(dup_user, Err(ApiError::Conflict(_))));

        let dup_student_id = store.create_profile(profile(b.id, "STU-1"));
        assert!(matches!(dup_student_id, Err(ApiError::Conflict(_))));
    }

    #[test]
    fn test_begin_analysis_only_once() {
        let store = InMemoryStore::new();
        let user = store.upsert_user(identity("a")).unwrap();
        let created = store.create_submission(submission(user.id)).unwrap();

        assert!(store.begin_analysis(created.id).unwrap());
        assert!(!store.begin_analysis(created.id).unwrap());
        let current = store.get_submission(created.id).unwrap().unwrap();
        assert_eq!(current.status, SubmissionStatus::Analyzing);
    }

    #[test]
    fn test_user_submissions_newest_first() {
        let store = InMemoryStore::new();
        let user = store.upsert_user(identity("a")).unwrap();
        let first = store.create_submission(submission(user.id)).unwrap();
        let second = store.create_submission(submission(user.id)).unwrap();

        let listed = store
            .list_user_submissions(user.id, Page::new(20, 0))
            .unwrap();
        assert_eq!(
            listed.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );

        let paged = store.list_user_submissions(user.id, Page::new(1, 1)).unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].id, first.id);
    }

    #[test]
    fn test_session_lifecycle() {
        let store = InMemoryStore::new();

        let session = store.create_session(UserId(1)).unwrap();
        assert!(store.get_session(&session.id).unwrap().is_some());

        store.delete_session(&session.id).unwrap();
        assert!(store.get_session(&session.id).unwrap().is_none());
    }

    #[test]
    fn test_result_for_deleted_submission_is_rejected() {
        let store = InMemoryStore::new();
        let user = store.upsert_user(identity("a")).unwrap();
        let created = store.create_submission(submission(user.id)).unwrap();
        assert!(store.begin_analysis(created.id).unwrap());
        assert!(store.delete_submission(created.id).unwrap());

        let result = store.create_analysis_result(NewAnalysisResult {
            submission_id: created.id,
            user_id: user.id,
            detected_issues: Vec::new(),
            overall_severity: dentalscan_core::Severity::Low,
            recommendations: Vec::new(),
            disclaimer: "n/a".to_string(),
            model_version: "v1.0.2".to_string(),
            processing_time: 0,
        });
        assert!(matches!(result, Err(ApiError::NotFound(_))));
        assert!(store.list_analysis_results().unwrap().is_empty());
    }
}
