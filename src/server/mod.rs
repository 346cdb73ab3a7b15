//! HTTP server module

mod error;
mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use axum::{
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::realtime::{Hub, LongPollCoordinator};
use crate::store::MemoryStore;

pub use error::{ApiError, ServerError};
pub use handlers::HealthResponse;

/// Shared application state accessible by all handlers
pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub coordinator: LongPollCoordinator,
    /// Long-poll wait ceiling
    pub ceiling: Duration,
    /// Fired on shutdown; pending long-polls resolve as canceled
    pub shutdown: CancellationToken,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(store: Arc<MemoryStore>, hub: Hub, ceiling: Duration) -> Self {
        let coordinator = LongPollCoordinator::new(store.clone(), hub);
        Self {
            store,
            coordinator,
            ceiling,
            shutdown: CancellationToken::new(),
            started_at: Utc::now(),
        }
    }

    /// Returns how long the server has been running
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
}

/// Create the HTTP router with all routes configured
pub fn create_router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/forms", post(handlers::create_form))
        .route(
            "/api/forms/:id",
            get(handlers::get_form).put(handlers::update_form),
        )
        .route(
            "/api/forms/:id/responses",
            get(handlers::list_responses).post(handlers::submit_response),
        )
        .route(
            "/api/forms/:id/responses/export.csv",
            get(handlers::export_csv),
        )
        .route(
            "/api/forms/:id/responses/export.md",
            get(handlers::export_markdown),
        )
        .route("/api/forms/:id/analytics", get(handlers::get_analytics))
        .route(
            "/api/forms/:id/analytics/longpoll",
            get(handlers::longpoll_analytics),
        )
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The formpulse HTTP server
pub struct Server {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl Server {
    pub fn new(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Run the server until Ctrl-C, binding to the configured address
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.bind.clone();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                source: e,
            })?;

        info!("formpulse server listening on {}", addr);

        let shutdown = self.state.shutdown.clone();
        let router = create_router(self.state, &self.config.cors_origins);
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for shutdown signal: {}", e);
                    std::future::pending::<()>().await;
                }
                info!("Shutting down, releasing pending long-polls");
                shutdown.cancel();
            })
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DistributionSnapshot, Form, LongPollResponse};
    use axum_test::TestServer;
    use serde_json::{json, Value};

    fn test_server_with_hub(ceiling: Duration) -> (TestServer, Arc<AppState>, Hub) {
        let hub = Hub::new();
        let store = Arc::new(MemoryStore::new(hub.clone()));
        let state = Arc::new(AppState::new(store, hub.clone(), ceiling));
        let router = create_router(state.clone(), &["http://localhost:3000".to_string()]);
        (TestServer::new(router).unwrap(), state, hub)
    }

    fn test_server(ceiling: Duration) -> (TestServer, Arc<AppState>) {
        let (server, state, _hub) = test_server_with_hub(ceiling);
        (server, state)
    }

    fn survey() -> Value {
        json!({
            "title": "Lunch poll",
            "fields": [
                {"id": "dish", "label": "Dish", "type": "multipleChoice", "required": true,
                 "options": ["Pizza", "Salad"]},
                {"id": "stars", "label": "Stars", "type": "rating", "scale": 5}
            ]
        })
    }

    async fn create_form(server: &TestServer) -> Form {
        let response = server.post("/api/forms").json(&survey()).await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Form>()
    }

    #[tokio::test]
    async fn test_router_has_health_endpoint() {
        let (server, _state) = test_server(Duration::from_secs(1));
        let response = server.get("/api/health").await;
        response.assert_status_ok();
        assert_eq!(response.json::<HealthResponse>().status, "ok");
    }

    #[tokio::test]
    async fn test_create_and_fetch_form() {
        let (server, _state) = test_server(Duration::from_secs(1));
        let form = create_form(&server).await;

        let response = server.get(&format!("/api/forms/{}", form.id)).await;
        response.assert_status_ok();
        assert_eq!(response.json::<Form>().title, "Lunch poll");
    }

    #[tokio::test]
    async fn test_invalid_form_payload() {
        let (server, _state) = test_server(Duration::from_secs(1));
        let response = server
            .post("/api/forms")
            .json(&json!({"title": "", "fields": []}))
            .await;
        response.assert_status_bad_request();
        assert_eq!(response.json::<Value>()["error"], "title required");
    }

    #[tokio::test]
    async fn test_unknown_form_is_404() {
        let (server, _state) = test_server(Duration::from_secs(1));
        for path in [
            "/api/forms/missing",
            "/api/forms/missing/analytics",
            "/api/forms/missing/analytics/longpoll?since=0",
            "/api/forms/missing/responses/export.csv",
        ] {
            let response = server.get(path).await;
            response.assert_status_not_found();
            assert_eq!(response.json::<Value>()["error"], "form not found");
        }
    }

    #[tokio::test]
    async fn test_submission_validation_errors() {
        let (server, _state) = test_server(Duration::from_secs(1));
        let form = create_form(&server).await;

        let response = server
            .post(&format!("/api/forms/{}/responses", form.id))
            .json(&json!({"answers": {"dish": "Soup", "stars": 9}}))
            .await;
        response.assert_status_bad_request();
        let body = response.json::<Value>();
        assert_eq!(body["errors"]["dish"], "Invalid option");
        assert_eq!(body["errors"]["stars"], "Out of range");

        let response = server
            .post(&format!("/api/forms/{}/responses", form.id))
            .json(&json!({}))
            .await;
        response.assert_status_bad_request();
        assert_eq!(response.json::<Value>()["error"], "answers required");
    }

    #[tokio::test]
    async fn test_submit_then_analytics() {
        let (server, _state) = test_server(Duration::from_secs(1));
        let form = create_form(&server).await;

        for (dish, stars) in [("Pizza", 5), ("Pizza", 4), ("Salad", 3)] {
            server
                .post(&format!("/api/forms/{}/responses", form.id))
                .json(&json!({"answers": {"dish": dish, "stars": stars}}))
                .await
                .assert_status(axum::http::StatusCode::CREATED);
        }

        let snapshot = server
            .get(&format!("/api/forms/{}/analytics", form.id))
            .await
            .json::<DistributionSnapshot>();
        assert_eq!(snapshot.response_count, 3);
        assert_eq!(snapshot.per_field[0].bars[0].value, 2);
        assert_eq!(snapshot.per_field[1].average, Some(4.0));

        let listed = server
            .get(&format!("/api/forms/{}/responses", form.id))
            .await
            .json::<Value>();
        assert_eq!(listed["items"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn test_longpoll_times_out() {
        let (server, _state) = test_server(Duration::from_millis(50));
        let form = create_form(&server).await;

        let response = server
            .get(&format!("/api/forms/{}/analytics/longpoll", form.id))
            .add_query_param("since", 0)
            .await;
        response.assert_status_ok();
        assert_eq!(
            response.json::<LongPollResponse>(),
            LongPollResponse::timeout(0)
        );
    }

    #[tokio::test]
    async fn test_longpoll_wakes_on_submission() {
        let (server, state, hub) = test_server_with_hub(Duration::from_secs(10));
        let form = create_form(&server).await;

        let url = format!("/api/forms/{}/analytics/longpoll?since=0", form.id);
        let poll = async { server.get(&url).await };
        let submit = async {
            while hub.waiter_count(&form.id) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            let answers = serde_json::from_value(json!({"dish": "Salad"})).unwrap();
            state.store.submit_response(&form.id, answers).await.unwrap();
        };

        let (response, ()) = tokio::join!(poll, submit);
        response.assert_status_ok();
        let snapshot = response.json::<DistributionSnapshot>();
        assert_eq!(snapshot.response_count, 1);
        assert_eq!(snapshot.per_field[0].bars[1].value, 1);
    }

    #[tokio::test]
    async fn test_shutdown_releases_longpoll_without_body() {
        let (server, state) = test_server(Duration::from_secs(10));
        let form = create_form(&server).await;
        state.shutdown.cancel();

        let response = server
            .get(&format!("/api/forms/{}/analytics/longpoll", form.id))
            .await;
        response.assert_status(axum::http::StatusCode::NO_CONTENT);
        assert!(response.text().is_empty());
    }

    #[tokio::test]
    async fn test_exports() {
        let (server, state) = test_server(Duration::from_secs(1));
        let form = create_form(&server).await;
        let answers = serde_json::from_value(json!({"dish": "Pizza", "stars": 4})).unwrap();
        state.store.submit_response(&form.id, answers).await.unwrap();

        let csv = server
            .get(&format!("/api/forms/{}/responses/export.csv", form.id))
            .await;
        csv.assert_status_ok();
        assert_eq!(
            csv.header("content-disposition"),
            "attachment; filename=\"Lunch_poll_responses.csv\""
        );
        assert!(csv.text().starts_with("responseId,submittedAt,Dish,Stars"));

        let md = server
            .get(&format!("/api/forms/{}/responses/export.md", form.id))
            .await;
        md.assert_status_ok();
        assert!(md.text().contains("## Dish"));

        server
            .get(&format!("/api/forms/{}/responses/export.pdf", form.id))
            .await
            .assert_status_not_found();
    }
}
