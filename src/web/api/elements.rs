use axum::{extract::State, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::Permission;
use crate::elements::{lookup, ElementSet, ElementSnapshot};
use crate::web::api::error::{ApiResult, ErrorResponse};
use crate::web::auth::{require_permission, AppState, AuthenticatedUser};

#[derive(Debug, Serialize, ToSchema)]
pub struct ElementsResponse {
    pub identifier: String,
    pub updated_at: DateTime<Utc>,
    pub element_set: ElementSet,
    /// The two element lines, re-serialized with fresh checksums.
    pub lines: Vec<String>,
    /// Days between the element epoch and now.
    pub age_days: f64,
}

fn describe(snapshot: &ElementSnapshot, identifier: &str) -> ApiResult<ElementsResponse> {
    let element_set = snapshot.resolve(identifier)?;
    let (line1, line2) = element_set.to_lines();
    Ok(ElementsResponse {
        identifier: identifier.to_string(),
        updated_at: snapshot.updated_at,
        age_days: element_set.age_days(Utc::now()),
        lines: vec![line1, line2],
        element_set,
    })
}

#[utoipa::path(
    get,
    path = "/api/elements",
    tag = "elements",
    responses(
        (status = 200, description = "Element set of the tracked object", body = ElementsResponse),
        (status = 401, description = "Missing or invalid API key"),
        (status = 403, description = "Insufficient permissions"),
        (status = 404, description = "Object not present in element text", body = ErrorResponse),
        (status = 503, description = "No element text loaded", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn get_elements(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<impl IntoResponse> {
    require_permission(&user, Permission::ViewPasses)?;

    let identifier = state.settings.load().identifier.clone();
    let snapshot = state.elements.snapshot()?;
    Ok(Json(describe(&snapshot, &identifier)?))
}

#[utoipa::path(
    put,
    path = "/api/elements",
    tag = "elements",
    request_body(content = String, content_type = "text/plain"),
    responses(
        (status = 200, description = "Element text replaced", body = ElementsResponse),
        (status = 400, description = "Malformed element lines", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key"),
        (status = 403, description = "Insufficient permissions"),
        (status = 404, description = "Tracked object not present in the text", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn put_elements(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    body: String,
) -> ApiResult<impl IntoResponse> {
    require_permission(&user, Permission::UpdateElements)?;

    let identifier = state.settings.load().identifier.clone();
    // Text that cannot serve the tracked object never replaces the current snapshot.
    lookup(&body, &identifier)?;

    if let Err(e) = state.cache.store(&body).await {
        log::warn!("Failed to write element cache: {e}");
    }
    let snapshot = state.elements.replace(body, Utc::now());
    log::info!("Element text uploaded by {}", user.name);
    Ok(Json(describe(&snapshot, &identifier)?))
}

#[utoipa::path(
    post,
    path = "/api/elements/refresh",
    tag = "elements",
    responses(
        (status = 200, description = "Element text downloaded from the configured source", body = ElementsResponse),
        (status = 401, description = "Missing or invalid API key"),
        (status = 403, description = "Insufficient permissions"),
        (status = 404, description = "Tracked object not present in the downloaded text", body = ErrorResponse),
        (status = 503, description = "Download failed", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn refresh_elements(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<impl IntoResponse> {
    require_permission(&user, Permission::UpdateElements)?;

    state.refresh_elements().await?;
    let identifier = state.settings.load().identifier.clone();
    let snapshot = state.elements.snapshot()?;
    Ok(Json(describe(&snapshot, &identifier)?))
}
