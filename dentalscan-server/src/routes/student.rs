//! Student profile procedures

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::auth::SuccessResponse;
use super::extract::{ApiJson, CurrentUser};
use crate::email::EmailSender;
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::BlobStore;
use crate::store::{NewAnalyticsEvent, NewStudentProfile, ProfileUpdate, Store, StudentProfile};

const AGE_RANGE: std::ops::RangeInclusive<u32> = 1..=150;
const YEAR_LEVEL_RANGE: std::ops::RangeInclusive<u32> = 1..=6;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfileRequest {
    pub first_name: String,
    pub middle_name: Option<String>,
    pub surname: String,
    pub student_id: String,
    pub age: Option<u32>,
    pub address: Option<String>,
    pub course: Option<String>,
    pub year_level: Option<u32>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub surname: Option<String>,
    pub age: Option<u32>,
    pub address: Option<String>,
    pub course: Option<String>,
    pub year_level: Option<u32>,
}

fn require_non_empty(value: &str, message: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(message.to_string()));
    }
    Ok(())
}

fn check_ranges(age: Option<u32>, year_level: Option<u32>) -> Result<(), ApiError> {
    if let Some(age) = age {
        if !AGE_RANGE.contains(&age) {
            return Err(ApiError::BadRequest("Age must be between 1 and 150".to_string()));
        }
    }
    if let Some(year_level) = year_level {
        if !YEAR_LEVEL_RANGE.contains(&year_level) {
            return Err(ApiError::BadRequest(
                "Year level must be between 1 and 6".to_string(),
            ));
        }
    }
    Ok(())
}

impl CreateProfileRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require_non_empty(&self.first_name, "First name required")?;
        require_non_empty(&self.surname, "Surname required")?;
        require_non_empty(&self.student_id, "Student ID required")?;
        check_ranges(self.age, self.year_level)
    }
}

impl UpdateProfileRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if let Some(first_name) = &self.first_name {
            require_non_empty(first_name, "First name required")?;
        }
        if let Some(surname) = &self.surname {
            require_non_empty(surname, "Surname required")?;
        }
        check_ranges(self.age, self.year_level)
    }
}

/// POST /api/student.createProfile
pub async fn create_profile<S, B, E>(
    State(state): State<Arc<AppState<S, B, E>>>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<CreateProfileRequest>,
) -> Result<Json<SuccessResponse>, ApiError>
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    req.validate()?;

    let course = req.course.clone();
    state.store.create_profile(NewStudentProfile {
        user_id: user.id,
        first_name: req.first_name.trim().to_string(),
        middle_name: req.middle_name,
        surname: req.surname.trim().to_string(),
        student_id: req.student_id.trim().to_string(),
        age: req.age,
        address: req.address,
        course: req.course,
        year_level: req.year_level,
    })?;

    state.store.track_event(NewAnalyticsEvent {
        event_type: "profile_created".to_string(),
        user_id: Some(user.id),
        metadata: Some(json!({ "course": course })),
    })?;

    tracing::info!(user_id = user.id.0, "Student profile created");
    Ok(SuccessResponse::ok())
}

/// GET /api/student.getProfile
pub async fn get_profile<S, B, E>(
    State(state): State<Arc<AppState<S, B, E>>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Option<StudentProfile>>, ApiError>
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    Ok(Json(state.store.get_profile(user.id)?))
}

/// POST /api/student.updateProfile
pub async fn update_profile<S, B, E>(
    State(state): State<Arc<AppState<S, B, E>>>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<Json<SuccessResponse>, ApiError>
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    req.validate()?;

    let update = ProfileUpdate {
        first_name: req.first_name.map(|v| v.trim().to_string()),
        middle_name: req.middle_name,
        surname: req.surname.map(|v| v.trim().to_string()),
        age: req.age,
        address: req.address,
        course: req.course,
        year_level: req.year_level,
    };

    state
        .store
        .update_profile(user.id, &update)?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;

    Ok(SuccessResponse::ok())
}
