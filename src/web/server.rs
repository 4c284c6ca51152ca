use axum::{routing::delete, routing::get, routing::post, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::api::elements as element_handlers;
use super::api::passes as pass_handlers;
use super::api::reminders as reminder_handlers;
use super::api::settings as settings_handlers;
use super::api_doc::ApiDoc;
use super::auth::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Pass prediction
        .route("/api/passes", get(pass_handlers::list_passes))
        .route("/api/passes/next", get(pass_handlers::next_pass))
        // Reminders
        .route(
            "/api/reminders",
            get(reminder_handlers::list_reminders).post(reminder_handlers::create_reminder),
        )
        .route(
            "/api/reminders/{id}",
            delete(reminder_handlers::cancel_reminder),
        )
        // Element text
        .route(
            "/api/elements",
            get(element_handlers::get_elements).put(element_handlers::put_elements),
        )
        .route(
            "/api/elements/refresh",
            post(element_handlers::refresh_elements),
        )
        // Tracking configuration
        .route(
            "/api/settings",
            get(settings_handlers::get_settings).put(settings_handlers::update_settings),
        )
        // OpenAPI / Swagger
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(state: AppState) -> std::io::Result<()> {
    let bind_addr = state.config.web.bind.clone();
    let app = build_router(state);

    log::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("Shutting down"),
        Err(e) => {
            log::error!("Cannot listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiKey, Config, Permission};
    use crate::elements::fixtures::{CATALOG, ISS};
    use crate::elements::ElementStore;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct Harness {
        router: Router,
        state: AppState,
    }

    impl Harness {
        fn new() -> Self {
            let mut config = Config::default();
            config.tracking.identifier = "ISS".into();
            config.elements.cache_file = std::env::temp_dir()
                .join(format!("passwatch-{}.txt", uuid::Uuid::new_v4()));
            config.api_keys = vec![
                ApiKey {
                    key: "full".into(),
                    name: "ops".into(),
                    permissions: [
                        Permission::ViewPasses,
                        Permission::ScheduleReminders,
                        Permission::UpdateElements,
                        Permission::ManageSettings,
                    ]
                    .into(),
                },
                ApiKey {
                    key: "viewer".into(),
                    name: "viewer".into(),
                    permissions: [Permission::ViewPasses].into(),
                },
            ];
            let state = AppState::new(config, Arc::new(ElementStore::new())).unwrap();
            Self {
                router: build_router(state.clone()),
                state,
            }
        }

        async fn call(
            &self,
            method: Method,
            uri: &str,
            key: Option<&str>,
            body: impl Into<Body>,
        ) -> (StatusCode, Value) {
            let mut request = Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json");
            if let Some(key) = key {
                request = request.header("Authorization", format!("Bearer {key}"));
            }
            let response = self
                .router
                .clone()
                .oneshot(request.body(body.into()).unwrap())
                .await
                .unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }

        async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.call(Method::GET, uri, Some("full"), Body::empty()).await
        }
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(self.state.cache.path());
        }
    }

    #[tokio::test]
    async fn rejects_missing_or_unknown_keys() {
        let harness = Harness::new();
        let (status, _) = harness
            .call(Method::GET, "/api/settings", None, Body::empty())
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = harness
            .call(Method::GET, "/api/settings", Some("nope"), Body::empty())
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn enforces_permissions() {
        let harness = Harness::new();
        let (status, _) = harness
            .call(Method::GET, "/api/settings", Some("viewer"), Body::empty())
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = harness
            .call(
                Method::PUT,
                "/api/settings",
                Some("viewer"),
                json!({ "lead_minutes": 5 }).to_string(),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "requires manage_settings");
    }

    #[tokio::test]
    async fn passes_need_element_text() {
        let harness = Harness::new();
        let (status, body) = harness.get("/api/passes").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "data_unavailable");

        harness.state.elements.replace(CATALOG.to_string(), Utc::now());
        let (status, body) = harness
            .get("/api/passes?start=2008-09-20T12:30:00Z&days=1&min_elevation=0")
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["object"], "ISS");
        let passes = body["passes"].as_array().unwrap();
        assert!(!passes.is_empty());
        assert!(passes[0]["peak_elevation_deg"].as_f64().unwrap() > 0.0);

        let (status, _) = harness.get("/api/passes?days=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn settings_updates_are_validated() {
        let harness = Harness::new();
        let (status, body) = harness
            .call(
                Method::PUT,
                "/api/settings",
                Some("full"),
                json!({ "coordinates": "59.93, 30.31", "lead_minutes": 20 }).to_string(),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["lead_minutes"], 20);

        let (status, _) = harness
            .call(
                Method::PUT,
                "/api/settings",
                Some("full"),
                json!({ "latitude_deg": 100.0 }).to_string(),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = harness
            .call(
                Method::PUT,
                "/api/settings",
                Some("full"),
                json!({ "horizon_days": 4_000_000_000u32 }).to_string(),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_failed");

        // Rejected updates leave predictions working.
        let (status, _) = harness.get("/api/passes/next").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (_, body) = harness.get("/api/settings").await;
        assert_eq!(body["station"]["latitude_deg"], 59.93);
        assert_eq!(body["horizon_days"], 3);
        assert_eq!(body["identifier"], "ISS");
    }

    #[tokio::test]
    async fn element_upload_is_checked_before_replacing() {
        let harness = Harness::new();
        let (status, _) = harness.get("/api/elements").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = harness
            .call(Method::PUT, "/api/elements", Some("full"), "no elements here")
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Break the line 1 checksum.
        let corrupted = ISS.replace(" 0  2927", " 0  2928");
        let (status, _) = harness
            .call(Method::PUT, "/api/elements", Some("full"), corrupted)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(harness.state.elements.snapshot().is_err());

        let (status, body) = harness
            .call(Method::PUT, "/api/elements", Some("full"), CATALOG)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["element_set"]["norad_id"], 25544);

        let (status, body) = harness.get("/api/elements").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["lines"][1], ISS.lines().nth(2).unwrap());
    }

    #[tokio::test]
    async fn reminder_lifecycle() {
        let harness = Harness::new();
        let rise = Utc::now() + Duration::hours(2);
        let request = json!({ "rise": rise }).to_string();

        // An explicit rise is taken as given; no element text is loaded.
        assert!(harness.state.elements.snapshot().is_err());
        let (status, body) = harness
            .call(Method::POST, "/api/reminders", Some("full"), request.clone())
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "scheduled");
        assert_eq!(body["reminder"]["subscriber"], "ops");
        assert_eq!(body["reminder"]["rise"], json!(rise));
        let id = body["reminder"]["id"].as_str().unwrap().to_string();

        let (status, body) = harness
            .call(Method::POST, "/api/reminders", Some("full"), request)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "already_scheduled");

        let soon = json!({ "rise": Utc::now() + Duration::minutes(5) }).to_string();
        let (_, body) = harness
            .call(Method::POST, "/api/reminders", Some("full"), soon)
            .await;
        assert_eq!(body["status"], "skipped");

        let (_, body) = harness.get("/api/reminders").await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let uri = format!("/api/reminders/{id}");
        let (status, _) = harness
            .call(Method::DELETE, &uri, Some("full"), Body::empty())
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = harness
            .call(Method::DELETE, &uri, Some("full"), Body::empty())
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Without a rise the next pass is needed, which needs element text.
        let (status, _) = harness
            .call(Method::POST, "/api/reminders", Some("full"), "{}")
            .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
