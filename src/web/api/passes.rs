use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::{Permission, MAX_HORIZON_DAYS};
use crate::predict::{GroundStation, PassEvent};
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::auth::{require_permission, AppState, AuthenticatedUser};

#[derive(Debug, Deserialize)]
pub struct PassesQuery {
    #[serde(default)]
    pub days: Option<u32>,
    #[serde(default)]
    pub min_elevation: Option<f64>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PassesResponse {
    pub object: String,
    pub station: GroundStation,
    pub start: DateTime<Utc>,
    pub passes: Vec<PassEvent>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NextPassResponse {
    pub object: String,
    /// Absent when nothing qualifies within the configured horizon.
    pub pass: Option<PassEvent>,
}

#[utoipa::path(
    get,
    path = "/api/passes",
    tag = "passes",
    params(
        ("days" = Option<u32>, Query, description = "Search horizon in days (default: configured horizon)"),
        ("min_elevation" = Option<f64>, Query, description = "Minimum peak elevation in degrees (default: configured threshold)"),
        ("start" = Option<String>, Query, description = "Window start (RFC3339, default: now)")
    ),
    responses(
        (status = 200, description = "Passes in rise order", body = PassesResponse),
        (status = 400, description = "Invalid parameters", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key"),
        (status = 403, description = "Insufficient permissions"),
        (status = 404, description = "Object not present in element text", body = ErrorResponse),
        (status = 422, description = "Propagation failed", body = ErrorResponse),
        (status = 503, description = "No element text loaded", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn list_passes(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<PassesQuery>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&user, Permission::ViewPasses)?;

    if let Some(days) = query.days {
        if !(1..=MAX_HORIZON_DAYS).contains(&days) {
            return Err(ApiError::Validation(format!(
                "days must be between 1 and {MAX_HORIZON_DAYS}"
            )));
        }
    }
    if let Some(elevation) = query.min_elevation {
        if !(0.0..=90.0).contains(&elevation) {
            return Err(ApiError::Validation(
                "min_elevation must be between 0 and 90".into(),
            ));
        }
    }

    let start = query.start.unwrap_or_else(Utc::now);
    let response = state.with_forecast(|forecast| {
        forecast
            .passes(start, query.days, query.min_elevation)
            .map(|passes| PassesResponse {
                object: forecast.tracking.identifier.clone(),
                station: forecast.tracking.station,
                start,
                passes,
            })
    })?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/passes/next",
    tag = "passes",
    responses(
        (status = 200, description = "Next qualifying pass", body = NextPassResponse),
        (status = 401, description = "Missing or invalid API key"),
        (status = 403, description = "Insufficient permissions"),
        (status = 404, description = "Object not present in element text", body = ErrorResponse),
        (status = 422, description = "Propagation failed", body = ErrorResponse),
        (status = 503, description = "No element text loaded", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn next_pass(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<impl IntoResponse> {
    require_permission(&user, Permission::ViewPasses)?;

    let response = state.with_forecast(|forecast| {
        forecast.next(Utc::now()).map(|pass| NextPassResponse {
            object: forecast.tracking.identifier.clone(),
            pass,
        })
    })?;
    Ok(Json(response))
}
