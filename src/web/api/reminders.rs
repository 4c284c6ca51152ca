use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::Permission;
use crate::notify::{ScheduleOutcome, ScheduledNotification};
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::auth::{require_permission, AppState, AuthenticatedUser};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReminderRequest {
    /// Rise of the pass to be reminded of; the next qualifying pass when omitted.
    /// An explicit instant is scheduled as given, without matching it against
    /// predicted passes, so clients may use passes from their own predictions.
    #[serde(default)]
    pub rise: Option<DateTime<Utc>>,
    /// Overrides the configured lead time.
    #[serde(default)]
    pub lead_minutes: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Reminder {
    pub id: Uuid,
    pub subscriber: String,
    pub rise: DateTime<Utc>,
    pub fire_at: DateTime<Utc>,
    pub lead_minutes: u32,
    pub delivered: bool,
}

impl From<&ScheduledNotification> for Reminder {
    fn from(n: &ScheduledNotification) -> Self {
        Reminder {
            id: n.id,
            subscriber: n.subscriber.clone(),
            rise: n.rise,
            fire_at: n.fire_at,
            lead_minutes: n.lead_minutes,
            delivered: n.is_delivered(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Scheduled,
    AlreadyScheduled,
    Skipped,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReminderResponse {
    pub status: ReminderStatus,
    pub fire_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder: Option<Reminder>,
}

#[utoipa::path(
    post,
    path = "/api/reminders",
    tag = "reminders",
    request_body = ReminderRequest,
    responses(
        (status = 201, description = "Reminder scheduled", body = ReminderResponse),
        (status = 200, description = "Reminder already pending, or its time has passed", body = ReminderResponse),
        (status = 401, description = "Missing or invalid API key"),
        (status = 403, description = "Insufficient permissions"),
        (status = 404, description = "No qualifying pass within the horizon", body = ErrorResponse),
        (status = 503, description = "No element text loaded", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn create_reminder(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<ReminderRequest>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&user, Permission::ScheduleReminders)?;

    let now = Utc::now();
    let tracking = state.settings.load();
    let rise = match request.rise {
        Some(rise) => rise,
        None => state
            .with_forecast(|forecast| forecast.next(now))?
            .map(|pass| pass.rise)
            .ok_or_else(|| {
                ApiError::NotFound(format!(
                    "no pass of {} within {} days",
                    tracking.identifier, tracking.horizon_days
                ))
            })?,
    };
    let lead_minutes = request.lead_minutes.unwrap_or(tracking.lead_minutes);

    let hook = state.hook.clone();
    let object = tracking.identifier.clone();
    let outcome = state
        .scheduler
        .schedule(&user.name, rise, lead_minutes, now, move |notification| {
            hook.deliver(&object, &notification);
        });

    let (status, response) = match &outcome {
        ScheduleOutcome::Scheduled(n) => (
            StatusCode::CREATED,
            ReminderResponse {
                status: ReminderStatus::Scheduled,
                fire_at: n.fire_at,
                reminder: Some(n.into()),
            },
        ),
        ScheduleOutcome::AlreadyScheduled(n) => (
            StatusCode::OK,
            ReminderResponse {
                status: ReminderStatus::AlreadyScheduled,
                fire_at: n.fire_at,
                reminder: Some(n.into()),
            },
        ),
        ScheduleOutcome::Skipped { fire_at } => (
            StatusCode::OK,
            ReminderResponse {
                status: ReminderStatus::Skipped,
                fire_at: *fire_at,
                reminder: None,
            },
        ),
    };
    Ok((status, Json(response)))
}

#[utoipa::path(
    get,
    path = "/api/reminders",
    tag = "reminders",
    responses(
        (status = 200, description = "Caller's pending reminders in firing order", body = Vec<Reminder>),
        (status = 401, description = "Missing or invalid API key"),
        (status = 403, description = "Insufficient permissions")
    ),
    security(("api_key" = []))
)]
pub async fn list_reminders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<impl IntoResponse> {
    require_permission(&user, Permission::ScheduleReminders)?;

    let reminders: Vec<Reminder> = state
        .scheduler
        .pending(Some(&user.name))
        .iter()
        .map(Reminder::from)
        .collect();
    Ok(Json(reminders))
}

#[utoipa::path(
    delete,
    path = "/api/reminders/{id}",
    tag = "reminders",
    params(
        ("id" = Uuid, Path, description = "Reminder id")
    ),
    responses(
        (status = 204, description = "Reminder cancelled"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 403, description = "Insufficient permissions"),
        (status = 404, description = "No such pending reminder", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn cancel_reminder(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&user, Permission::ScheduleReminders)?;

    let owned = state
        .scheduler
        .pending(Some(&user.name))
        .iter()
        .any(|n| n.id == id);
    if !owned || !state.scheduler.cancel(id) {
        return Err(ApiError::NotFound(format!("no pending reminder {id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}
