//! Admin procedures: student directory, submissions, analytics, reports, audit log
//!
//! Every handler takes `AdminUser`, so non-admin callers are rejected before
//! any of this code runs.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, SecondsFormat, Utc};
use dentalscan_core::{AnalysisStats, IssueCount, Severity, SeverityDistribution, SubmissionStatus};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::extract::{AdminUser, ApiQuery};
use crate::email::EmailSender;
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::BlobStore;
use crate::store::{
    AdminLog, NewAdminLog, NewAnalyticsEvent, Page, Store, StoreResult, StudentFilter,
    StudentProfile, StudentSummary, Submission, SubmissionFilter, User, UserId,
};

const DEFAULT_LIST_LIMIT: u32 = 50;
const DEFAULT_LOG_LIMIT: u32 = 100;
const PROFILE_SUBMISSIONS_LIMIT: u32 = 100;
const EXPORT_LIMIT: u32 = 10_000;
const CSV_HEADER: &str = "ID,User ID,Status,Created At";

#[derive(Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PageQuery {
    fn page(&self, default_limit: u32) -> Page {
        Page::new(self.limit.unwrap_or(default_limit), self.offset.unwrap_or(0))
    }
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentFilterQuery {
    pub course: Option<String>,
    pub year_level: Option<u32>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRef {
    pub user_id: u64,
}

#[derive(Serialize)]
pub struct StudentDetails {
    pub user: User,
    pub profile: Option<StudentProfile>,
    pub submissions: Vec<Submission>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionFilterQuery {
    pub user_id: Option<u64>,
    pub status: Option<SubmissionStatus>,
    pub severity: Option<Severity>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_students: u64,
    pub total_submissions: u64,
    pub analysis_stats: Option<AnalysisStats>,
}

fn log_action<S: Store>(
    store: &S,
    admin: &User,
    action: &str,
    target_user_id: Option<UserId>,
    details: Option<Value>,
) -> StoreResult<()> {
    store.log_admin_action(NewAdminLog {
        admin_id: admin.id,
        action: action.to_string(),
        target_user_id,
        details,
    })?;
    tracing::info!(admin_id = admin.id.0, action = %action, "Admin action");
    Ok(())
}

fn analysis_stats<S: Store>(store: &S) -> StoreResult<Option<AnalysisStats>> {
    let results = store.list_analysis_results()?;
    Ok(AnalysisStats::fold(
        results
            .iter()
            .map(|r| (r.overall_severity, r.detected_issues.as_slice())),
    ))
}

fn to_csv(submissions: &[Submission]) -> String {
    let mut lines = Vec::with_capacity(submissions.len() + 1);
    lines.push(CSV_HEADER.to_string());
    for s in submissions {
        lines.push(format!(
            "{},{},{},{}",
            s.id.0,
            s.user_id.0,
            s.status.as_str(),
            s.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        ));
    }
    lines.join("\n")
}

/// GET /api/admin.students.list
pub async fn list_students<S, B, E>(
    State(state): State<Arc<AppState<S, B, E>>>,
    AdminUser(_admin): AdminUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<Vec<StudentSummary>>, ApiError>
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    let students = state
        .store
        .list_students(&StudentFilter::default(), query.page(DEFAULT_LIST_LIMIT))?;
    Ok(Json(students))
}

/// GET /api/admin.students.search
pub async fn search_students<S, B, E>(
    State(state): State<Arc<AppState<S, B, E>>>,
    AdminUser(_admin): AdminUser,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<Json<Vec<StudentSummary>>, ApiError>
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    let needle = query.query.trim();
    if needle.is_empty() {
        return Err(ApiError::BadRequest("Search query required".to_string()));
    }

    let page = Page::new(
        query.limit.unwrap_or(DEFAULT_LIST_LIMIT),
        query.offset.unwrap_or(0),
    );
    Ok(Json(state.store.search_students(needle, page)?))
}

/// GET /api/admin.students.filter
pub async fn filter_students<S, B, E>(
    State(state): State<Arc<AppState<S, B, E>>>,
    AdminUser(admin): AdminUser,
    ApiQuery(query): ApiQuery<StudentFilterQuery>,
) -> Result<Json<Vec<StudentSummary>>, ApiError>
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    log_action(
        state.store.as_ref(),
        &admin,
        "filter_students",
        None,
        Some(json!({ "course": query.course, "yearLevel": query.year_level })),
    )?;

    let filter = StudentFilter {
        course: query.course,
        year_level: query.year_level,
    };
    let page = Page::new(
        query.limit.unwrap_or(DEFAULT_LIST_LIMIT),
        query.offset.unwrap_or(0),
    );
    Ok(Json(state.store.list_students(&filter, page)?))
}

/// GET /api/admin.students.getProfile
pub async fn get_student_profile<S, B, E>(
    State(state): State<Arc<AppState<S, B, E>>>,
    AdminUser(admin): AdminUser,
    ApiQuery(query): ApiQuery<StudentRef>,
) -> Result<Json<StudentDetails>, ApiError>
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    let user_id = UserId(query.user_id);
    let user = state
        .store
        .get_user(user_id)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    let profile = state.store.get_profile(user_id)?;
    let submissions = state
        .store
        .list_user_submissions(user_id, Page::new(PROFILE_SUBMISSIONS_LIMIT, 0))?;

    log_action(
        state.store.as_ref(),
        &admin,
        "view_student_profile",
        Some(user_id),
        None,
    )?;

    Ok(Json(StudentDetails {
        user,
        profile,
        submissions,
    }))
}

/// GET /api/admin.submissions.list
pub async fn list_submissions<S, B, E>(
    State(state): State<Arc<AppState<S, B, E>>>,
    AdminUser(_admin): AdminUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<Vec<Submission>>, ApiError>
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    let submissions = state
        .store
        .filter_submissions(&SubmissionFilter::default(), query.page(DEFAULT_LIST_LIMIT))?;
    Ok(Json(submissions))
}

/// GET /api/admin.submissions.filter
pub async fn filter_submissions<S, B, E>(
    State(state): State<Arc<AppState<S, B, E>>>,
    AdminUser(admin): AdminUser,
    ApiQuery(query): ApiQuery<SubmissionFilterQuery>,
) -> Result<Json<Vec<Submission>>, ApiError>
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    let filter = SubmissionFilter {
        user_id: query.user_id.map(UserId),
        status: query.status,
        severity: query.severity,
        start_date: query.start_date,
        end_date: query.end_date,
    };

    log_action(
        state.store.as_ref(),
        &admin,
        "filter_submissions",
        None,
        serde_json::to_value(&filter).ok(),
    )?;

    let page = Page::new(
        query.limit.unwrap_or(DEFAULT_LIST_LIMIT),
        query.offset.unwrap_or(0),
    );
    Ok(Json(state.store.filter_submissions(&filter, page)?))
}

/// GET /api/admin.analytics.getSummary
pub async fn get_summary<S, B, E>(
    State(state): State<Arc<AppState<S, B, E>>>,
    AdminUser(admin): AdminUser,
) -> Result<Json<DashboardSummary>, ApiError>
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    let summary = DashboardSummary {
        total_students: state.store.count_students()?,
        total_submissions: state.store.count_submissions()?,
        analysis_stats: analysis_stats(state.store.as_ref())?,
    };

    state.store.track_event(NewAnalyticsEvent {
        event_type: "admin_dashboard_viewed".to_string(),
        user_id: Some(admin.id),
        metadata: None,
    })?;

    Ok(Json(summary))
}

/// GET /api/admin.analytics.getIssueDistribution
pub async fn get_issue_distribution<S, B, E>(
    State(state): State<Arc<AppState<S, B, E>>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<IssueCount>>, ApiError>
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    let issues = analysis_stats(state.store.as_ref())?
        .map(|stats| stats.common_issues)
        .unwrap_or_default();
    Ok(Json(issues))
}

/// GET /api/admin.analytics.getSeverityDistribution
pub async fn get_severity_distribution<S, B, E>(
    State(state): State<Arc<AppState<S, B, E>>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<SeverityDistribution>, ApiError>
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    let distribution = analysis_stats(state.store.as_ref())?
        .map(|stats| stats.severity_distribution)
        .unwrap_or_default();
    Ok(Json(distribution))
}

/// GET /api/admin.reports.exportCSV
pub async fn export_csv<S, B, E>(
    State(state): State<Arc<AppState<S, B, E>>>,
    AdminUser(admin): AdminUser,
    ApiQuery(query): ApiQuery<DateRangeQuery>,
) -> Result<Response, ApiError>
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    let filter = SubmissionFilter {
        start_date: query.start_date,
        end_date: query.end_date,
        ..SubmissionFilter::default()
    };
    let submissions = state
        .store
        .filter_submissions(&filter, Page::new(EXPORT_LIMIT, 0))?;

    log_action(
        state.store.as_ref(),
        &admin,
        "export_csv",
        None,
        Some(json!({ "startDate": query.start_date, "endDate": query.end_date })),
    )?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"submissions.csv\"",
            ),
        ],
        to_csv(&submissions),
    )
        .into_response())
}

/// GET /api/admin.logs.list
///
/// The calling admin's own entries only.
pub async fn list_logs<S, B, E>(
    State(state): State<Arc<AppState<S, B, E>>>,
    AdminUser(admin): AdminUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<Vec<AdminLog>>, ApiError>
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    Ok(Json(
        state
            .store
            .list_admin_logs(admin.id, query.page(DEFAULT_LOG_LIMIT))?,
    ))
}
