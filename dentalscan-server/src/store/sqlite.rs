//! SQLite-based storage implementation

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use dentalscan_core::{Severity, SubmissionStatus};
use rusqlite::types::{Type, Value as SqlValue};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{
    AdminLog, AnalysisResult, AnalyticsEvent, AuditStore, EmailNotification, IdentityUpsert,
    ImageQuality, NewAdminLog, NewAnalysisResult, NewAnalyticsEvent, NewEmailNotification,
    NewStudentProfile, NewSubmission, NotificationStatus, NotificationType, Page, ProfileUpdate,
    Role, Session, SessionId, SessionStore, StoreResult, StudentFilter, StudentProfile,
    StudentSummary, Submission, SubmissionFilter, SubmissionId, SubmissionStore, User, UserId,
    UserStore,
};
use crate::error::ApiError;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

const USER_COLUMNS: &str =
    "id, open_id, name, email, login_method, role, created_at, updated_at, last_signed_in";

const PROFILE_COLUMNS: &str = "id, user_id, first_name, middle_name, surname, student_id, age, \
     address, course, year_level, created_at, updated_at";

const SUBMISSION_COLUMNS: &str = "s.id, s.user_id, s.image_key, s.image_url, s.file_name, \
     s.mime_type, s.file_size, s.image_quality, s.status, s.created_at, s.updated_at";

const RESULT_COLUMNS: &str = "id, submission_id, user_id, detected_issues, overall_severity, \
     recommendations, disclaimer, model_version, processing_time, created_at";

const STUDENT_SUMMARY_QUERY: &str = "SELECT u.id, u.name, u.email, u.created_at, p.student_id, \
     p.course, p.year_level FROM users u LEFT JOIN student_profiles p ON p.user_id = u.id \
     WHERE u.role = 'user'";

/// SQLite-based store implementing every storage trait
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn internal(e: rusqlite::Error) -> ApiError {
    ApiError::Internal(e.to_string())
}

/// The constraint message for a UNIQUE violation, if that is what `e` is
fn unique_violation(e: &rusqlite::Error) -> Option<&str> {
    match e {
        rusqlite::Error::SqliteFailure(err, msg)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Some(msg.as_deref().unwrap_or(""))
        }
        _ => None,
    }
}

fn foreign_key_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering
fn fmt_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn get_ts(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn to_json<T: serde::Serialize>(value: &T) -> StoreResult<String> {
    serde_json::to_string(value).map_err(|e| ApiError::Internal(e.to_string()))
}

fn page_params(values: &mut Vec<SqlValue>, page: Page) -> &'static str {
    values.push(SqlValue::Integer(page.limit as i64));
    values.push(SqlValue::Integer(page.offset as i64));
    " LIMIT ? OFFSET ?"
}

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    let role: String = row.get(5)?;
    Ok(User {
        id: UserId(row.get::<_, i64>(0)? as u64),
        open_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        login_method: row.get(4)?,
        role: Role::from_str(&role).unwrap_or(Role::User),
        created_at: get_ts(row, 6)?,
        updated_at: get_ts(row, 7)?,
        last_signed_in: get_ts(row, 8)?,
    })
}

fn row_to_profile(row: &Row) -> rusqlite::Result<StudentProfile> {
    Ok(StudentProfile {
        id: row.get::<_, i64>(0)? as u64,
        user_id: UserId(row.get::<_, i64>(1)? as u64),
        first_name: row.get(2)?,
        middle_name: row.get(3)?,
        surname: row.get(4)?,
        student_id: row.get(5)?,
        age: row.get::<_, Option<i64>>(6)?.map(|v| v as u32),
        address: row.get(7)?,
        course: row.get(8)?,
        year_level: row.get::<_, Option<i64>>(9)?.map(|v| v as u32),
        created_at: get_ts(row, 10)?,
        updated_at: get_ts(row, 11)?,
    })
}

fn row_to_summary(row: &Row) -> rusqlite::Result<StudentSummary> {
    Ok(StudentSummary {
        id: UserId(row.get::<_, i64>(0)? as u64),
        name: row.get(1)?,
        email: row.get(2)?,
        created_at: get_ts(row, 3)?,
        student_id: row.get(4)?,
        course: row.get(5)?,
        year_level: row.get::<_, Option<i64>>(6)?.map(|v| v as u32),
    })
}

fn row_to_submission(row: &Row) -> rusqlite::Result<Submission> {
    let quality: Option<String> = row.get(7)?;
    let status: String = row.get(8)?;
    Ok(Submission {
        id: SubmissionId(row.get::<_, i64>(0)? as u64),
        user_id: UserId(row.get::<_, i64>(1)? as u64),
        image_key: row.get(2)?,
        image_url: row.get(3)?,
        file_name: row.get(4)?,
        mime_type: row.get(5)?,
        file_size: row.get::<_, i64>(6)? as u64,
        image_quality: quality
            .as_deref()
            .and_then(ImageQuality::from_str)
            .unwrap_or_default(),
        status: SubmissionStatus::from_str(&status).unwrap_or(SubmissionStatus::Failed),
        created_at: get_ts(row, 9)?,
        updated_at: get_ts(row, 10)?,
    })
}

fn row_to_result(row: &Row) -> rusqlite::Result<AnalysisResult> {
    let issues: String = row.get(3)?;
    let severity: String = row.get(4)?;
    let recommendations: String = row.get(5)?;
    Ok(AnalysisResult {
        id: row.get::<_, i64>(0)? as u64,
        submission_id: SubmissionId(row.get::<_, i64>(1)? as u64),
        user_id: UserId(row.get::<_, i64>(2)? as u64),
        detected_issues: parse_json(3, &issues)?,
        overall_severity: Severity::from_str(&severity).unwrap_or(Severity::Low),
        recommendations: parse_json(5, &recommendations)?,
        disclaimer: row.get(6)?,
        model_version: row.get(7)?,
        processing_time: row.get::<_, i64>(8)? as u64,
        created_at: get_ts(row, 9)?,
    })
}

fn row_to_admin_log(row: &Row) -> rusqlite::Result<AdminLog> {
    let details: Option<String> = row.get(4)?;
    Ok(AdminLog {
        id: row.get::<_, i64>(0)? as u64,
        admin_id: UserId(row.get::<_, i64>(1)? as u64),
        action: row.get(2)?,
        target_user_id: row.get::<_, Option<i64>>(3)?.map(|id| UserId(id as u64)),
        details: details.map(|d| parse_json(4, &d)).transpose()?,
        created_at: get_ts(row, 5)?,
    })
}

fn row_to_event(row: &Row) -> rusqlite::Result<AnalyticsEvent> {
    let metadata: Option<String> = row.get(3)?;
    Ok(AnalyticsEvent {
        id: row.get::<_, i64>(0)? as u64,
        event_type: row.get(1)?,
        user_id: row.get::<_, Option<i64>>(2)?.map(|id| UserId(id as u64)),
        metadata: metadata.map(|m| parse_json(3, &m)).transpose()?,
        created_at: get_ts(row, 4)?,
    })
}

fn row_to_notification(row: &Row) -> rusqlite::Result<EmailNotification> {
    let notification_type: String = row.get(3)?;
    let status: String = row.get(6)?;
    Ok(EmailNotification {
        id: row.get::<_, i64>(0)? as u64,
        user_id: UserId(row.get::<_, i64>(1)? as u64),
        submission_id: row.get::<_, Option<i64>>(2)?.map(|id| SubmissionId(id as u64)),
        notification_type: NotificationType::from_str(&notification_type)
            .unwrap_or(NotificationType::SystemAlert),
        recipient_email: row.get(4)?,
        subject: row.get(5)?,
        status: NotificationStatus::from_str(&status).unwrap_or(NotificationStatus::Pending),
        sent_at: row
            .get::<_, Option<String>>(7)?
            .map(|raw| parse_ts(7, &raw))
            .transpose()?,
        created_at: get_ts(row, 8)?,
    })
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path
    pub fn open(path: &str) -> Result<Self, ApiError> {
        let conn = Connection::open(path).map_err(internal)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(internal)?;

        Self::migrate(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, ApiError> {
        Self::open(":memory:")
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".to_string()))
    }

    /// Run database migrations
    fn migrate(conn: &Connection) -> Result<(), ApiError> {
        let current_version = Self::get_schema_version(conn)?;

        if current_version < SCHEMA_VERSION {
            tracing::info!(
                current = current_version,
                target = SCHEMA_VERSION,
                "Running database migrations"
            );

            if current_version < 1 {
                Self::migrate_v1(conn)?;
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .map_err(internal)?;

            tracing::info!("Database migrations complete");
        }

        Ok(())
    }

    /// Get current schema version (0 if no schema exists)
    fn get_schema_version(conn: &Connection) -> Result<i32, ApiError> {
        let table_exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
                [],
                |row| row.get(0),
            )
            .map_err(internal)?;

        if !table_exists {
            return Ok(0);
        }

        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0).map(|v| v.unwrap_or(0))
        })
        .map_err(internal)
    }

    /// Migration to version 1: initial schema
    fn migrate_v1(conn: &Connection) -> Result<(), ApiError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                open_id TEXT NOT NULL UNIQUE,
                name TEXT,
                email TEXT,
                login_method TEXT,
                role TEXT NOT NULL DEFAULT 'user',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                last_signed_in TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS student_profiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
                first_name TEXT NOT NULL,
                middle_name TEXT,
                surname TEXT NOT NULL,
                student_id TEXT NOT NULL UNIQUE,
                age INTEGER,
                address TEXT,
                course TEXT,
                year_level INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS submissions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                image_key TEXT NOT NULL,
                image_url TEXT NOT NULL,
                file_name TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                image_quality TEXT DEFAULT 'good',
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_submissions_user_id ON submissions(user_id);

            CREATE TABLE IF NOT EXISTS analysis_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                submission_id INTEGER NOT NULL UNIQUE REFERENCES submissions(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL,
                detected_issues TEXT NOT NULL,
                overall_severity TEXT NOT NULL,
                recommendations TEXT NOT NULL,
                disclaimer TEXT NOT NULL,
                model_version TEXT NOT NULL,
                processing_time INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS admin_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                admin_id INTEGER NOT NULL,
                action TEXT NOT NULL,
                target_user_id INTEGER,
                details TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_admin_logs_admin_id ON admin_logs(admin_id);

            CREATE TABLE IF NOT EXISTS analytics_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_type TEXT NOT NULL,
                user_id INTEGER,
                metadata TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS email_notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                submission_id INTEGER,
                notification_type TEXT NOT NULL,
                recipient_email TEXT NOT NULL,
                subject TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                sent_at TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(internal)?;

        Ok(())
    }

    fn query_students(
        &self,
        conditions: &str,
        mut values: Vec<SqlValue>,
        page: Page,
    ) -> StoreResult<Vec<StudentSummary>> {
        let conn = self.conn()?;
        let limit = page_params(&mut values, page);
        let sql = format!(
            "{}{} ORDER BY u.created_at DESC, u.id DESC{}",
            STUDENT_SUMMARY_QUERY, conditions, limit
        );

        let mut stmt = conn.prepare(&sql).map_err(internal)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), row_to_summary)
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;
        Ok(rows)
    }
}

impl UserStore for SqliteStore {
    fn upsert_user(&self, identity: IdentityUpsert) -> StoreResult<User> {
        let conn = self.conn()?;
        let now = fmt_ts(&Utc::now());

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM users WHERE open_id = ?1",
                params![identity.open_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(internal)?;

        let id = match existing {
            Some(id) => {
                conn.execute(
                    "UPDATE users SET name = COALESCE(?1, name), email = COALESCE(?2, email),
                     login_method = COALESCE(?3, login_method), role = COALESCE(?4, role),
                     updated_at = ?5, last_signed_in = ?5
                     WHERE id = ?6",
                    params![
                        identity.name,
                        identity.email,
                        identity.login_method,
                        identity.role.map(|r| r.as_str()),
                        now,
                        id,
                    ],
                )
                .map_err(internal)?;
                id
            }
            None => {
                conn.execute(
                    "INSERT INTO users (open_id, name, email, login_method, role, created_at, updated_at, last_signed_in)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?6)",
                    params![
                        identity.open_id,
                        identity.name,
                        identity.email,
                        identity.login_method,
                        identity.role.unwrap_or(Role::User).as_str(),
                        now,
                    ],
                )
                .map_err(internal)?;
                conn.last_insert_rowid()
            }
        };

        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![id],
            row_to_user,
        )
        .map_err(internal)
    }

    fn get_user(&self, user_id: UserId) -> StoreResult<Option<User>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![user_id.0 as i64],
            row_to_user,
        )
        .optional()
        .map_err(internal)
    }

    fn get_user_by_open_id(&self, open_id: &str) -> StoreResult<Option<User>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM users WHERE open_id = ?1", USER_COLUMNS),
            params![open_id],
            row_to_user,
        )
        .optional()
        .map_err(internal)
    }

    fn list_users_by_role(&self, role: Role) -> StoreResult<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM users WHERE role = ?1 ORDER BY id",
                USER_COLUMNS
            ))
            .map_err(internal)?;
        let users = stmt
            .query_map(params![role.as_str()], row_to_user)
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;
        Ok(users)
    }

    fn count_students(&self) -> StoreResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM users WHERE role = ?1",
                params![Role::User.as_str()],
                |row| row.get(0),
            )
            .map_err(internal)?;
        Ok(count as u64)
    }

    fn create_profile(&self, profile: NewStudentProfile) -> StoreResult<StudentProfile> {
        let conn = self.conn()?;
        let now = fmt_ts(&Utc::now());

        conn.execute(
            "INSERT INTO student_profiles (user_id, first_name, middle_name, surname, student_id,
             age, address, course, year_level, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                profile.user_id.0 as i64,
                profile.first_name,
                profile.middle_name,
                profile.surname,
                profile.student_id,
                profile.age.map(|v| v as i64),
                profile.address,
                profile.course,
                profile.year_level.map(|v| v as i64),
                now,
            ],
        )
        .map_err(|e| match unique_violation(&e) {
            Some(msg) if msg.contains("student_id") => {
                ApiError::Conflict("Student ID already registered".to_string())
            }
            Some(_) => ApiError::Conflict("Profile already exists".to_string()),
            None => internal(e),
        })?;

        conn.query_row(
            &format!("SELECT {} FROM student_profiles WHERE id = ?1", PROFILE_COLUMNS),
            params![conn.last_insert_rowid()],
            row_to_profile,
        )
        .map_err(internal)
    }

    fn get_profile(&self, user_id: UserId) -> StoreResult<Option<StudentProfile>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM student_profiles WHERE user_id = ?1",
                PROFILE_COLUMNS
            ),
            params![user_id.0 as i64],
            row_to_profile,
        )
        .optional()
        .map_err(internal)
    }

    fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> StoreResult<Option<StudentProfile>> {
        let conn = self.conn()?;
        let now = fmt_ts(&Utc::now());

        let rows_affected = conn
            .execute(
                "UPDATE student_profiles SET
                 first_name = COALESCE(?1, first_name),
                 middle_name = COALESCE(?2, middle_name),
                 surname = COALESCE(?3, surname),
                 age = COALESCE(?4, age),
                 address = COALESCE(?5, address),
                 course = COALESCE(?6, course),
                 year_level = COALESCE(?7, year_level),
                 updated_at = ?8
                 WHERE user_id = ?9",
                params![
                    update.first_name,
                    update.middle_name,
                    update.surname,
                    update.age.map(|v| v as i64),
                    update.address,
                    update.course,
                    update.year_level.map(|v| v as i64),
                    now,
                    user_id.0 as i64,
                ],
            )
            .map_err(internal)?;

        if rows_affected == 0 {
            return Ok(None);
        }

        conn.query_row(
            &format!(
                "SELECT {} FROM student_profiles WHERE user_id = ?1",
                PROFILE_COLUMNS
            ),
            params![user_id.0 as i64],
            row_to_profile,
        )
        .optional()
        .map_err(internal)
    }

    fn list_students(
        &self,
        filter: &StudentFilter,
        page: Page,
    ) -> StoreResult<Vec<StudentSummary>> {
        let mut conditions = String::new();
        let mut values = Vec::new();

        if let Some(course) = &filter.course {
            conditions.push_str(" AND p.course = ?");
            values.push(SqlValue::Text(course.clone()));
        }
        if let Some(year_level) = filter.year_level {
            conditions.push_str(" AND p.year_level = ?");
            values.push(SqlValue::Integer(year_level as i64));
        }

        self.query_students(&conditions, values, page)
    }

    fn search_students(&self, query: &str, page: Page) -> StoreResult<Vec<StudentSummary>> {
        self.query_students(
            " AND instr(LOWER(p.student_id), LOWER(?)) > 0",
            vec![SqlValue::Text(query.to_string())],
            page,
        )
    }
}

impl SubmissionStore for SqliteStore {
    fn create_submission(&self, submission: NewSubmission) -> StoreResult<Submission> {
        let conn = self.conn()?;
        let now = fmt_ts(&Utc::now());

        conn.execute(
            "INSERT INTO submissions (user_id, image_key, image_url, file_name, mime_type,
             file_size, image_quality, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                submission.user_id.0 as i64,
                submission.image_key,
                submission.image_url,
                submission.file_name,
                submission.mime_type,
                submission.file_size as i64,
                submission.image_quality.as_str(),
                SubmissionStatus::Pending.as_str(),
                now,
            ],
        )
        .map_err(internal)?;

        conn.query_row(
            &format!("SELECT {} FROM submissions s WHERE s.id = ?1", SUBMISSION_COLUMNS),
            params![conn.last_insert_rowid()],
            row_to_submission,
        )
        .map_err(internal)
    }

    fn get_submission(&self, id: SubmissionId) -> StoreResult<Option<Submission>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM submissions s WHERE s.id = ?1", SUBMISSION_COLUMNS),
            params![id.0 as i64],
            row_to_submission,
        )
        .optional()
        .map_err(internal)
    }

    fn list_user_submissions(&self, user_id: UserId, page: Page) -> StoreResult<Vec<Submission>> {
        self.filter_submissions(
            &SubmissionFilter {
                user_id: Some(user_id),
                ..SubmissionFilter::default()
            },
            page,
        )
    }

    fn filter_submissions(
        &self,
        filter: &SubmissionFilter,
        page: Page,
    ) -> StoreResult<Vec<Submission>> {
        let mut sql = format!(
            "SELECT {} FROM submissions s LEFT JOIN analysis_results r ON r.submission_id = s.id WHERE 1 = 1",
            SUBMISSION_COLUMNS
        );
        let mut values = Vec::new();

        if let Some(user_id) = filter.user_id {
            sql.push_str(" AND s.user_id = ?");
            values.push(SqlValue::Integer(user_id.0 as i64));
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND s.status = ?");
            values.push(SqlValue::Text(status.as_str().to_string()));
        }
        if let Some(severity) = filter.severity {
            sql.push_str(" AND r.overall_severity = ?");
            values.push(SqlValue::Text(severity.as_str().to_string()));
        }
        if let Some(start) = filter.start_date {
            sql.push_str(" AND s.created_at >= ?");
            values.push(SqlValue::Text(fmt_ts(&start)));
        }
        if let Some(end) = filter.end_date {
            sql.push_str(" AND s.created_at <= ?");
            values.push(SqlValue::Text(fmt_ts(&end)));
        }
        sql.push_str(" ORDER BY s.created_at DESC, s.id DESC");
        sql.push_str(page_params(&mut values, page));

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql).map_err(internal)?;
        let submissions = stmt
            .query_map(params_from_iter(values.iter()), row_to_submission)
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;
        Ok(submissions)
    }

    fn count_submissions(&self) -> StoreResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM submissions", [], |row| row.get(0))
            .map_err(internal)?;
        Ok(count as u64)
    }

    fn begin_analysis(&self, id: SubmissionId) -> StoreResult<bool> {
        let conn = self.conn()?;
        let rows_affected = conn
            .execute(
                "UPDATE submissions SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
                params![
                    SubmissionStatus::Analyzing.as_str(),
                    fmt_ts(&Utc::now()),
                    id.0 as i64,
                    SubmissionStatus::Pending.as_str(),
                ],
            )
            .map_err(internal)?;
        Ok(rows_affected == 1)
    }

    fn set_submission_status(&self, id: SubmissionId, status: SubmissionStatus) -> StoreResult<()> {
        let conn = self.conn()?;
        let rows_affected = conn
            .execute(
                "UPDATE submissions SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), fmt_ts(&Utc::now()), id.0 as i64],
            )
            .map_err(internal)?;

        if rows_affected == 0 {
            return Err(ApiError::not_found());
        }
        Ok(())
    }

    fn delete_submission(&self, id: SubmissionId) -> StoreResult<bool> {
        let conn = self.conn()?;

        conn.execute(
            "DELETE FROM analysis_results WHERE submission_id = ?1",
            params![id.0 as i64],
        )
        .map_err(internal)?;

        let rows_affected = conn
            .execute("DELETE FROM submissions WHERE id = ?1", params![id.0 as i64])
            .map_err(internal)?;
        Ok(rows_affected > 0)
    }

    fn create_analysis_result(&self, result: NewAnalysisResult) -> StoreResult<AnalysisResult> {
        let issues = to_json(&result.detected_issues)?;
        let recommendations = to_json(&result.recommendations)?;
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO analysis_results (submission_id, user_id, detected_issues, overall_severity,
             recommendations, disclaimer, model_version, processing_time, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                result.submission_id.0 as i64,
                result.user_id.0 as i64,
                issues,
                result.overall_severity.as_str(),
                recommendations,
                result.disclaimer,
                result.model_version,
                result.processing_time as i64,
                fmt_ts(&Utc::now()),
            ],
        )
        .map_err(|e| match unique_violation(&e) {
            Some(_) => ApiError::Conflict("Submission already has an analysis result".to_string()),
            None if foreign_key_violation(&e) => ApiError::not_found(),
            None => internal(e),
        })?;

        conn.query_row(
            &format!("SELECT {} FROM analysis_results WHERE id = ?1", RESULT_COLUMNS),
            params![conn.last_insert_rowid()],
            row_to_result,
        )
        .map_err(internal)
    }

    fn get_analysis_result(
        &self,
        submission_id: SubmissionId,
    ) -> StoreResult<Option<AnalysisResult>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM analysis_results WHERE submission_id = ?1",
                RESULT_COLUMNS
            ),
            params![submission_id.0 as i64],
            row_to_result,
        )
        .optional()
        .map_err(internal)
    }

    fn list_analysis_results(&self) -> StoreResult<Vec<AnalysisResult>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM analysis_results ORDER BY created_at DESC, id DESC",
                RESULT_COLUMNS
            ))
            .map_err(internal)?;
        let results = stmt
            .query_map([], row_to_result)
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;
        Ok(results)
    }
}

impl AuditStore for SqliteStore {
    fn log_admin_action(&self, log: NewAdminLog) -> StoreResult<AdminLog> {
        let details = log.details.as_ref().map(to_json).transpose()?;
        let created_at = Utc::now();
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO admin_logs (admin_id, action, target_user_id, details, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                log.admin_id.0 as i64,
                log.action,
                log.target_user_id.map(|id| id.0 as i64),
                details,
                fmt_ts(&created_at),
            ],
        )
        .map_err(internal)?;

        Ok(AdminLog {
            id: conn.last_insert_rowid() as u64,
            admin_id: log.admin_id,
            action: log.action,
            target_user_id: log.target_user_id,
            details: log.details,
            created_at,
        })
    }

    fn list_admin_logs(&self, admin_id: UserId, page: Page) -> StoreResult<Vec<AdminLog>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, admin_id, action, target_user_id, details, created_at
                 FROM admin_logs WHERE admin_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
            )
            .map_err(internal)?;
        let logs = stmt
            .query_map(
                params![admin_id.0 as i64, page.limit as i64, page.offset as i64],
                row_to_admin_log,
            )
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;
        Ok(logs)
    }

    fn track_event(&self, event: NewAnalyticsEvent) -> StoreResult<AnalyticsEvent> {
        let metadata = event.metadata.as_ref().map(to_json).transpose()?;
        let created_at = Utc::now();
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO analytics_events (event_type, user_id, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                event.event_type,
                event.user_id.map(|id| id.0 as i64),
                metadata,
                fmt_ts(&created_at),
            ],
        )
        .map_err(internal)?;

        Ok(AnalyticsEvent {
            id: conn.last_insert_rowid() as u64,
            event_type: event.event_type,
            user_id: event.user_id,
            metadata: event.metadata,
            created_at,
        })
    }

    fn list_events(&self, event_type: &str) -> StoreResult<Vec<AnalyticsEvent>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, event_type, user_id, metadata, created_at
                 FROM analytics_events WHERE event_type = ?1 ORDER BY id",
            )
            .map_err(internal)?;
        let events = stmt
            .query_map(params![event_type], row_to_event)
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;
        Ok(events)
    }

    fn create_notification(
        &self,
        notification: NewEmailNotification,
    ) -> StoreResult<EmailNotification> {
        let created_at = Utc::now();
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO email_notifications (user_id, submission_id, notification_type,
             recipient_email, subject, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                notification.user_id.0 as i64,
                notification.submission_id.map(|id| id.0 as i64),
                notification.notification_type.as_str(),
                notification.recipient_email,
                notification.subject,
                NotificationStatus::Pending.as_str(),
                fmt_ts(&created_at),
            ],
        )
        .map_err(internal)?;

        Ok(EmailNotification {
            id: conn.last_insert_rowid() as u64,
            user_id: notification.user_id,
            submission_id: notification.submission_id,
            notification_type: notification.notification_type,
            recipient_email: notification.recipient_email,
            subject: notification.subject,
            status: NotificationStatus::Pending,
            sent_at: None,
            created_at,
        })
    }

    fn set_notification_status(&self, id: u64, status: NotificationStatus) -> StoreResult<()> {
        let conn = self.conn()?;
        let sent_at = (status == NotificationStatus::Sent).then(|| fmt_ts(&Utc::now()));

        let rows_affected = conn
            .execute(
                "UPDATE email_notifications SET status = ?1, sent_at = COALESCE(?2, sent_at)
                 WHERE id = ?3",
                params![status.as_str(), sent_at, id as i64],
            )
            .map_err(internal)?;

        if rows_affected == 0 {
            return Err(ApiError::not_found());
        }
        Ok(())
    }

    fn list_notifications(&self, user_id: UserId) -> StoreResult<Vec<EmailNotification>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, submission_id, notification_type, recipient_email, subject,
                 status, sent_at, created_at
                 FROM email_notifications WHERE user_id = ?1 ORDER BY id",
            )
            .map_err(internal)?;
        let notifications = stmt
            .query_map(params![user_id.0 as i64], row_to_notification)
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;
        Ok(notifications)
    }
}

impl SessionStore for SqliteStore {
    fn create_session(&self, user_id: UserId) -> StoreResult<Session> {
        let conn = self.conn()?;
        let session = Session {
            id: SessionId(Uuid::new_v4().to_string()),
            user_id,
            created_at: Utc::now(),
        };

        conn.execute(
            "INSERT INTO sessions (id, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![
                session.id.0,
                session.user_id.0 as i64,
                fmt_ts(&session.created_at),
            ],
        )
        .map_err(internal)?;

        Ok(session)
    }

    fn get_session(&self, session_id: &SessionId) -> StoreResult<Option<Session>> {
        let conn = self.conn()?;

        conn.query_row(
            "SELECT id, user_id, created_at FROM sessions WHERE id = ?1",
            params![session_id.0],
            |row| {
                let id: String = row.get(0)?;
                let user_id: i64 = row.get(1)?;
                Ok(Session {
                    id: SessionId(id),
                    user_id: UserId(user_id as u64),
                    created_at: get_ts(row, 2)?,
                })
            },
        )
        .optional()
        .map_err(internal)
    }

    fn delete_session(&self, session_id: &SessionId) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id.0])
            .map_err(internal)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dentalscan_core::{DetectedIssue, IssueType, Priority, Recommendation};
    use tempfile::TempDir;

    fn create_test_store() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
        (store, dir) // Return dir to keep it alive
    }

    fn sign_in(store: &SqliteStore, open_id: &str) -> User {
        store
            .upsert_user(IdentityUpsert {
                open_id: open_id.to_string(),
                name: Some(format!("User {}", open_id)),
                email: Some(format!("{}@example.com", open_id)),
                login_method: Some("oauth".to_string()),
                role: None,
            })
            .unwrap()
    }

    fn upload(store: &SqliteStore, user_id: UserId) -> Submission {
        store
            .create_submission(NewSubmission {
                user_id,
                image_key: "submissions/1/1-teeth.jpg".to_string(),
                image_url: "http://localhost:3000/files/submissions/1/1-teeth.jpg".to_string(),
                file_name: "teeth.jpg".to_string(),
                mime_type: "image/jpeg".to_string(),
                file_size: 2 * 1024 * 1024,
                image_quality: ImageQuality::Fair,
            })
            .unwrap()
    }

    fn result_for(submission: &Submission, severity: Severity) -> NewAnalysisResult {
        NewAnalysisResult {
            submission_id: submission.id,
            user_id: submission.user_id,
            detected_issues: vec![DetectedIssue {
                issue_type: IssueType::Plaque,
                location: "tooth_12".to_string(),
                severity,
                confidence: 0.81,
                description: IssueType::Plaque.description().to_string(),
            }],
            overall_severity: severity,
            recommendations: vec![Recommendation {
                title: "Daily Flossing".to_string(),
                description: "Floss daily".to_string(),
                priority: Priority::Medium,
            }],
            disclaimer: dentalscan_core::DISCLAIMER.to_string(),
            model_version: dentalscan_core::MODEL_VERSION.to_string(),
            processing_time: 2345,
        }
    }

    #[test]
    fn test_upsert_user_by_open_id() {
        let (store, _dir) = create_test_store();

        let first = sign_in(&store, "abc");
        let again = sign_in(&store, "abc");
        assert_eq!(first.id, again.id);
        assert!(again.last_signed_in >= first.last_signed_in);

        let found = store.get_user_by_open_id("abc").unwrap().unwrap();
        assert_eq!(found.email.as_deref(), Some("abc@example.com"));
        assert_eq!(found.role, Role::User);
    }

    #[test]
    fn test_profile_conflicts() {
        let (store, _dir) = create_test_store();
        let a = sign_in(&store, "a");
        let b = sign_in(&store, "b");

        let new_profile = |user_id, student_id: &str| NewStudentProfile {
            user_id,
            first_name: "John".to_string(),
            middle_name: None,
            surname: "Doe".to_string(),
            student_id: student_id.to_string(),
            age: None,
            address: None,
            course: Some("Dentistry".to_string()),
            year_level: Some(3),
        };

        store.create_profile(new_profile(a.id, "STU-2024-001")).unwrap();

        match store.create_profile(new_profile(a.id, "STU-2024-002")) {
            Err(ApiError::Conflict(msg)) => assert_eq!(msg, "Profile already exists"),
            other => panic!("expected conflict, got {:?}", other),
        }
        match store.create_profile(new_profile(b.id, "STU-2024-001")) {
            Err(ApiError::Conflict(msg)) => assert_eq!(msg, "Student ID already registered"),
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_update_profile_is_partial() {
        let (store, _dir) = create_test_store();
        let user = sign_in(&store, "a");

        assert!(store
            .update_profile(user.id, &ProfileUpdate::default())
            .unwrap()
            .is_none());

        store
            .create_profile(NewStudentProfile {
                user_id: user.id,
                first_name: "John".to_string(),
                middle_name: None,
                surname: "Doe".to_string(),
                student_id: "STU-1".to_string(),
                age: Some(20),
                address: None,
                course: None,
                year_level: None,
            })
            .unwrap();

        let updated = store
            .update_profile(
                user.id,
                &ProfileUpdate {
                    age: Some(21),
                    course: Some("Dental Hygiene".to_string()),
                    ..ProfileUpdate::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.age, Some(21));
        assert_eq!(updated.course.as_deref(), Some("Dental Hygiene"));
        assert_eq!(updated.first_name, "John");
    }

    #[test]
    fn test_analysis_result_roundtrip_and_uniqueness() {
        let (store, _dir) = create_test_store();
        let user = sign_in(&store, "a");
        let submission = upload(&store, user.id);

        let created = store
            .create_analysis_result(result_for(&submission, Severity::Moderate))
            .unwrap();
        let loaded = store.get_analysis_result(submission.id).unwrap().unwrap();
        assert_eq!(loaded.id, created.id);
        assert_eq!(loaded.detected_issues[0].issue_type, IssueType::Plaque);
        assert_eq!(loaded.recommendations[0].title, "Daily Flossing");
        assert_eq!(loaded.processing_time, 2345);

        let duplicate = store.create_analysis_result(result_for(&submission, Severity::High));
        assert!(matches!(duplicate, Err(ApiError::Conflict(_))));
    }

    #[test]
    fn test_status_transitions() {
        let (store, _dir) = create_test_store();
        let user = sign_in(&store, "a");
        let submission = upload(&store, user.id);
        assert_eq!(submission.status, SubmissionStatus::Pending);
        assert_eq!(submission.image_quality, ImageQuality::Fair);

        assert!(store.begin_analysis(submission.id).unwrap());
        assert!(!store.begin_analysis(submission.id).unwrap());

        store
            .set_submission_status(submission.id, SubmissionStatus::Completed)
            .unwrap();
        let current = store.get_submission(submission.id).unwrap().unwrap();
        assert_eq!(current.status, SubmissionStatus::Completed);
    }

    #[test]
    fn test_delete_submission_removes_result() {
        let (store, _dir) = create_test_store();
        let user = sign_in(&store, "a");
        let submission = upload(&store, user.id);
        store
            .create_analysis_result(result_for(&submission, Severity::Low))
            .unwrap();

        assert!(store.delete_submission(submission.id).unwrap());
        assert!(store.get_submission(submission.id).unwrap().is_none());
        assert!(store.get_analysis_result(submission.id).unwrap().is_none());
        assert!(!store.delete_submission(submission.id).unwrap());
    }

    #[test]
    fn test_result_for_deleted_submission_is_rejected() {
        let (store, _dir) = create_test_store();
        let user = sign_in(&store, "a");
        let submission = upload(&store, user.id);
        assert!(store.delete_submission(submission.id).unwrap());

        let result = store.create_analysis_result(result_for(&submission, Severity::High));
        assert!(matches!(result, Err(ApiError::NotFound(_))));
        assert!(store.list_analysis_results().unwrap().is_empty());
    }

    #[test]
    fn test_filter_submissions_by_severity_and_status() {
        let (store, _dir) = create_test_store();
        let user = sign_in(&store, "a");
        let low = upload(&store, user.id);
        let high = upload(&store, user.id);
        let _pending = upload(&store, user.id);

        store.create_analysis_result(result_for(&low, Severity::Low)).unwrap();
        store.create_analysis_result(result_for(&high, Severity::High)).unwrap();
        store.set_submission_status(low.id, SubmissionStatus::Completed).unwrap();
        store.set_submission_status(high.id, SubmissionStatus::Completed).unwrap();

        let by_severity = store
            .filter_submissions(
                &SubmissionFilter {
                    severity: Some(Severity::High),
                    ..SubmissionFilter::default()
                },
                Page::new(50, 0),
            )
            .unwrap();
        assert_eq!(by_severity.len(), 1);
        assert_eq!(by_severity[0].id, high.id);

        let completed = store
            .filter_submissions(
                &SubmissionFilter {
                    status: Some(SubmissionStatus::Completed),
                    ..SubmissionFilter::default()
                },
                Page::new(50, 0),
            )
            .unwrap();
        assert_eq!(
            completed.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![high.id, low.id]
        );
    }

    #[test]
    fn test_students_exclude_admins_and_search() {
        let (store, _dir) = create_test_store();
        let student = sign_in(&store, "student");
        store
            .upsert_user(IdentityUpsert {
                open_id: "owner".to_string(),
                name: None,
                email: None,
                login_method: None,
                role: Some(Role::Admin),
            })
            .unwrap();
        let _no_profile = sign_in(&store, "newcomer");

        store
            .create_profile(NewStudentProfile {
                user_id: student.id,
                first_name: "Ana".to_string(),
                middle_name: None,
                surname: "Cruz".to_string(),
                student_id: "STU-2024-777".to_string(),
                age: None,
                address: None,
                course: Some("Dentistry".to_string()),
                year_level: Some(4),
            })
            .unwrap();

        let all = store
            .list_students(&StudentFilter::default(), Page::new(50, 0))
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(store.count_students().unwrap(), 2);

        let found = store.search_students("stu-2024", Page::new(50, 0)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, student.id);

        let filtered = store
            .list_students(
                &StudentFilter {
                    course: Some("Dentistry".to_string()),
                    year_level: Some(4),
                },
                Page::new(50, 0),
            )
            .unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_notification_status_updates() {
        let (store, _dir) = create_test_store();
        let user = sign_in(&store, "a");

        let created = store
            .create_notification(NewEmailNotification {
                user_id: user.id,
                submission_id: None,
                notification_type: NotificationType::SystemAlert,
                recipient_email: "a@example.com".to_string(),
                subject: "Hello".to_string(),
            })
            .unwrap();
        assert_eq!(created.status, NotificationStatus::Pending);

        store
            .set_notification_status(created.id, NotificationStatus::Sent)
            .unwrap();
        let listed = store.list_notifications(user.id).unwrap();
        assert_eq!(listed[0].status, NotificationStatus::Sent);
        assert!(listed[0].sent_at.is_some());
    }

    #[test]
    fn test_session_lifecycle() {
        let (store, _dir) = create_test_store();

        let user = sign_in(&store, "a");
        let session = store.create_session(user.id).unwrap();

        assert!(store.get_session(&session.id).unwrap().is_some());

        store.delete_session(&session.id).unwrap();
        assert!(store.get_session(&session.id).unwrap().is_none());
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("persist.db");
        let path = path.to_str().unwrap();

        let user_id = {
            let store = SqliteStore::open(path).unwrap();
            sign_in(&store, "persisted").id
        };

        let store = SqliteStore::open(path).unwrap();
        let user = store.get_user(user_id).unwrap().unwrap();
        assert_eq!(user.open_id, "persisted");
    }

    #[test]
    fn test_corrupt_timestamp_is_an_error() {
        let (store, _dir) = create_test_store();
        let user = sign_in(&store, "student-1");

        store
            .conn()
            .unwrap()
            .execute(
                "UPDATE users SET created_at = 'yesterday' WHERE id = ?1",
                params![user.id.0 as i64],
            )
            .unwrap();

        assert!(matches!(store.get_user(user.id), Err(ApiError::Internal(_))));
    }
}
