use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::{Config, Permission, TrackingConfiguration};
use crate::elements::ElementStore;
use crate::notify::{NotificationScheduler, ReminderHook};
use crate::predict::Forecast;
use crate::shared::Latest;
use crate::source::{self, ElementCache, SourceError};

#[derive(Clone)]
pub struct AuthenticatedUser {
    pub name: String,
    pub permissions: HashSet<Permission>,
}

impl AuthenticatedUser {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub settings: Arc<Latest<TrackingConfiguration>>,
    pub elements: Arc<ElementStore>,
    pub scheduler: NotificationScheduler,
    pub hook: ReminderHook,
    pub http: reqwest::Client,
    pub cache: ElementCache,
}

impl AppState {
    pub fn new(config: Config, elements: Arc<ElementStore>) -> Result<Self, SourceError> {
        Ok(Self {
            settings: Arc::new(Latest::new(config.tracking.clone())),
            scheduler: NotificationScheduler::new(),
            hook: ReminderHook::new(config.notify.command.clone()),
            http: source::client()?,
            cache: ElementCache::new(config.elements.cache_file.clone()),
            config: Arc::new(config),
            elements,
        })
    }

    /// Run `f` against a forecast built from the current settings snapshot.
    pub fn with_forecast<T>(&self, f: impl FnOnce(&Forecast<'_>) -> T) -> T {
        let tracking = self.settings.load();
        f(&Forecast {
            elements: &self.elements,
            tracking: &tracking,
            settings: self.config.detector.settings(),
        })
    }

    pub async fn refresh_elements(&self) -> Result<(), SourceError> {
        let url = self.settings.load().element_source.clone();
        source::refresh(&self.http, &url, &self.cache, &self.elements, Utc::now()).await?;
        Ok(())
    }
}

pub enum AuthError {
    MissingAuth,
    InvalidFormat,
    InvalidKey,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Missing Authorization header"),
            AuthError::InvalidFormat => (StatusCode::UNAUTHORIZED, "Invalid Authorization format"),
            AuthError::InvalidKey => (StatusCode::UNAUTHORIZED, "Invalid API key"),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub struct PermissionError(Permission);

impl IntoResponse for PermissionError {
    fn into_response(self) -> Response {
        (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "Insufficient permissions",
                "message": format!("requires {}", self.0),
            })),
        )
            .into_response()
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .ok_or(AuthError::MissingAuth)?
            .to_str()
            .map_err(|_| AuthError::InvalidFormat)?;

        let key = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidFormat)?;

        let api_key = state
            .config
            .find_api_key(key)
            .ok_or(AuthError::InvalidKey)?;

        Ok(AuthenticatedUser {
            name: api_key.name.clone(),
            permissions: api_key.permissions.clone(),
        })
    }
}

pub fn require_permission(
    user: &AuthenticatedUser,
    permission: Permission,
) -> Result<(), PermissionError> {
    if user.has_permission(permission) {
        Ok(())
    } else {
        Err(PermissionError(permission))
    }
}
