//! HTTP routes for the backend
//!
//! Procedures live under `/api/<procedure>`: queries are `GET` with a query
//! string, mutations are `POST` with a JSON body.

mod admin;
mod auth;
mod extract;
mod files;
mod session;
mod student;
mod submission;

pub use extract::{
    AdminUser, ApiJson, ApiQuery, CurrentUser, IdentityCallback, IDENTITY_SECRET_HEADER,
};
pub use session::SESSION_COOKIE;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_cookies::CookieManagerLayer;
use tower_http::trace::TraceLayer;

use crate::email::EmailSender;
use crate::state::AppState;
use crate::storage::BlobStore;
use crate::store::Store;

/// Request body ceiling: a 10MB image grows by a third once base64-encoded
const MAX_REQUEST_BYTES: usize = 15 * 1024 * 1024;

/// Create the router with all routes
pub fn create_router<S, B, E>(state: Arc<AppState<S, B, E>>) -> Router
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    Router::new()
        .route("/api/auth.signIn", post(auth::sign_in))
        .route("/api/auth.me", get(auth::me))
        .route("/api/auth.logout", post(auth::logout))
        .route("/api/student.createProfile", post(student::create_profile))
        .route("/api/student.getProfile", get(student::get_profile))
        .route("/api/student.updateProfile", post(student::update_profile))
        .route("/api/submission.upload", post(submission::upload))
        .route("/api/submission.getHistory", get(submission::get_history))
        .route("/api/submission.getDetails", get(submission::get_details))
        .route("/api/submission.delete", post(submission::delete))
        .route("/api/submission.analyze", post(submission::analyze))
        .route("/api/admin.students.list", get(admin::list_students))
        .route("/api/admin.students.search", get(admin::search_students))
        .route("/api/admin.students.filter", get(admin::filter_students))
        .route("/api/admin.students.getProfile", get(admin::get_student_profile))
        .route("/api/admin.submissions.list", get(admin::list_submissions))
        .route("/api/admin.submissions.filter", get(admin::filter_submissions))
        .route("/api/admin.analytics.getSummary", get(admin::get_summary))
        .route(
            "/api/admin.analytics.getIssueDistribution",
            get(admin::get_issue_distribution),
        )
        .route(
            "/api/admin.analytics.getSeverityDistribution",
            get(admin::get_severity_distribution),
        )
        .route("/api/admin.reports.exportCSV", get(admin::export_csv))
        .route("/api/admin.logs.list", get(admin::list_logs))
        .route("/files/*key", get(files::get_file))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
