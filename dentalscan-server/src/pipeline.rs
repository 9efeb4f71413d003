//! Background analysis runs and the notifications that follow them

use std::sync::Arc;
use std::time::Instant;

use dentalscan_core::{notification, EmailTemplate, Severity, SubmissionStatus, DISCLAIMER};
use serde_json::json;
use tokio::task::JoinHandle;

use crate::email::EmailSender;
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::BlobStore;
use crate::store::{
    AnalysisResult, NewAnalysisResult, NewAnalyticsEvent, NewEmailNotification,
    NotificationStatus, NotificationType, Role, Store, Submission, SubmissionId, UserId,
};

const UNKNOWN_STUDENT: &str = "Unknown student";

/// Run the analyzer for a submission already moved to `analyzing`
pub fn spawn_analysis<S, B, E>(
    state: Arc<AppState<S, B, E>>,
    submission: Submission,
) -> JoinHandle<()>
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    tokio::spawn(async move { run_analysis(&state, submission).await })
}

/// Analyze, record the result, mark the submission and send notifications.
///
/// A failure to record leaves the submission `failed`.
pub async fn run_analysis<S, B, E>(state: &AppState<S, B, E>, submission: Submission)
where
    S: Store,
    B: BlobStore,
    E: EmailSender,
{
    let started = Instant::now();
    let (delay, report) = {
        let mut rng = rand::thread_rng();
        (
            state.analyzer.sample_delay(&mut rng),
            state.analyzer.generate(&mut rng),
        )
    };

    tracing::debug!(submission_id = submission.id.0, ?delay, "Analyzing submission");
    tokio::time::sleep(delay).await;

    let result = NewAnalysisResult {
        submission_id: submission.id,
        user_id: submission.user_id,
        detected_issues: report.detected_issues,
        overall_severity: report.overall_severity,
        recommendations: report.recommendations,
        disclaimer: DISCLAIMER.to_string(),
        model_version: report.model_version,
        processing_time: started.elapsed().as_millis() as u64,
    };

    match record_result(state, result) {
        Ok(result) => {
            tracing::info!(
                submission_id = submission.id.0,
                severity = result.overall_severity.as_str(),
                processing_time = result.processing_time,
                "Analysis completed"
            );
            notify(state, &submission, &result);
        }
        Err(ApiError::NotFound(_)) => {
            tracing::info!(
                submission_id = submission.id.0,
                "Submission deleted during analysis, result discarded"
            );
        }
        Err(e) => {
            tracing::error!(submission_id = submission.id.0, error = %e, "Analysis failed");
            if let Err(e) = state
                .store
                .set_submission_status(submission.id, SubmissionStatus::Failed)
            {
                tracing::error!(
                    submission_id = submission.id.0,
                    error = %e,
                    "Could not mark submission failed"
                );
            }
        }
    }
}

fn record_result<S, B, E>(
    state: &AppState<S, B, E>,
    result: NewAnalysisResult,
) -> Result<AnalysisResult, ApiError>
where
    S: Store,
    B: BlobStore,
    E: EmailSender,
{
    let submission_id = result.submission_id;
    let result = state.store.create_analysis_result(result)?;

    let completed = SubmissionStatus::Analyzing.transition(SubmissionStatus::Completed)?;
    state.store.set_submission_status(submission_id, completed)?;

    track_completion(state, &result);
    Ok(result)
}

fn track_completion<S, B, E>(state: &AppState<S, B, E>, result: &AnalysisResult)
where
    S: Store,
    B: BlobStore,
    E: EmailSender,
{
    let event = NewAnalyticsEvent {
        event_type: "analysis_completed".to_string(),
        user_id: Some(result.user_id),
        metadata: Some(json!({
            "submissionId": result.submission_id.0,
            "severity": result.overall_severity.as_str(),
        })),
    };
    if let Err(e) = state.store.track_event(event) {
        tracing::warn!(error = %e, "Failed to record analysis_completed event");
    }
}

/// Email the student, and every admin when the result is high severity
fn notify<S, B, E>(state: &AppState<S, B, E>, submission: &Submission, result: &AnalysisResult)
where
    S: Store,
    B: BlobStore,
    E: EmailSender,
{
    let student = match state.store.get_user(submission.user_id) {
        Ok(Some(user)) => user,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(error = %e, "Could not load student for notification");
            return;
        }
    };

    let display_name = match state.store.get_profile(student.id) {
        Ok(Some(profile)) => Some(profile.full_name()),
        _ => student.name.clone(),
    };

    if let Some(email) = &student.email {
        let template = notification::analysis_complete(
            display_name.as_deref(),
            &state.analysis_url(submission.id.0),
            result.overall_severity,
        );
        deliver(
            state,
            student.id,
            Some(submission.id),
            NotificationType::AnalysisComplete,
            email,
            &template,
        );
    }

    if result.overall_severity != Severity::High {
        return;
    }

    let admins = match state.store.list_users_by_role(Role::Admin) {
        Ok(admins) => admins,
        Err(e) => {
            tracing::warn!(error = %e, "Could not load admins for critical finding alert");
            return;
        }
    };

    let template = notification::critical_finding(
        display_name.as_deref().unwrap_or(UNKNOWN_STUDENT),
        result.overall_severity,
        result.detected_issues.len(),
        &state.admin_url(),
    );
    for admin in &admins {
        if let Some(email) = &admin.email {
            deliver(
                state,
                admin.id,
                Some(submission.id),
                NotificationType::CriticalFinding,
                email,
                &template,
            );
        }
    }
}

/// Record a pending notification, send it, then record the outcome
fn deliver<S, B, E>(
    state: &AppState<S, B, E>,
    user_id: UserId,
    submission_id: Option<SubmissionId>,
    notification_type: NotificationType,
    recipient: &str,
    template: &EmailTemplate,
) where
    S: Store,
    B: BlobStore,
    E: EmailSender,
{
    let record = match state.store.create_notification(NewEmailNotification {
        user_id,
        submission_id,
        notification_type,
        recipient_email: recipient.to_string(),
        subject: template.subject.clone(),
    }) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to record notification");
            return;
        }
    };

    let status = match state.email_sender.send(recipient, template) {
        Ok(()) => NotificationStatus::Sent,
        Err(e) => {
            tracing::warn!(to = %recipient, error = %e, "Failed to send notification email");
            NotificationStatus::Failed
        }
    };

    if let Err(e) = state.store.set_notification_status(record.id, status) {
        tracing::warn!(error = %e, "Failed to update notification status");
    }
}
