use axum::{extract::State, response::IntoResponse, Json};

use crate::config::{Permission, SettingsPatch, TrackingConfiguration};
use crate::web::api::error::{ApiResult, ErrorResponse};
use crate::web::auth::{require_permission, AppState, AuthenticatedUser};

#[utoipa::path(
    get,
    path = "/api/settings",
    tag = "settings",
    responses(
        (status = 200, description = "Current tracking configuration", body = TrackingConfiguration),
        (status = 401, description = "Missing or invalid API key"),
        (status = 403, description = "Insufficient permissions")
    ),
    security(("api_key" = []))
)]
pub async fn get_settings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<impl IntoResponse> {
    require_permission(&user, Permission::ViewPasses)?;
    Ok(Json(TrackingConfiguration::clone(&state.settings.load())))
}

#[utoipa::path(
    put,
    path = "/api/settings",
    tag = "settings",
    request_body = SettingsPatch,
    responses(
        (status = 200, description = "Updated tracking configuration", body = TrackingConfiguration),
        (status = 400, description = "Rejected update; nothing was changed", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key"),
        (status = 403, description = "Insufficient permissions")
    ),
    security(("api_key" = []))
)]
pub async fn update_settings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(patch): Json<SettingsPatch>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&user, Permission::ManageSettings)?;

    let updated = state.settings.update(|current| current.apply(&patch))?;
    log::info!("Tracking configuration updated by {}: {updated:?}", user.name);
    Ok(Json(TrackingConfiguration::clone(&updated)))
}
