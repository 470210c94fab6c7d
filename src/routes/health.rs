use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use super::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status ("ok" when healthy, "degraded" when the climate API is unreachable)
    pub status: String,
    /// Service version
    pub version: String,
    /// Whether the climate API answered its health check
    pub backend: bool,
    /// Status reported by the climate API, if it answered
    pub backend_status: Option<String>,
    /// Whether a map token is configured
    pub map_available: bool,
}

/// Health check endpoint.
///
/// Reports the service version and whether the climate API is reachable.
/// Returns status "degraded" (still 200) if it is not, since the dashboard
/// keeps serving cached views.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let backend = state.queries.health().await;
    if let Err(e) = &backend {
        tracing::warn!("Climate API health check failed: {}", e);
    }

    Json(HealthResponse {
        status: if backend.is_ok() {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: backend.is_ok(),
        backend_status: backend.ok().map(|h| h.status),
        map_available: state.map_token.is_some(),
    })
}

/// Drop all cached backend data.
///
/// Failed queries are not retried automatically; this is the user's
/// "reload". The next view read requests everything again.
#[utoipa::path(
    post,
    path = "/api/v1/reload",
    tag = "Health",
    responses(
        (status = 204, description = "Caches cleared"),
    )
)]
pub async fn reload(State(state): State<AppState>) -> StatusCode {
    state.queries.clear();
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_health_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health-check"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "healthy" })))
            .mount(&server)
            .await;

        let Json(health) = health_check(State(AppState::for_backend(&server.uri(), Some("pk.test")))).await;
        assert_eq!(health.status, "ok");
        assert!(health.backend);
        assert_eq!(health.backend_status.as_deref(), Some("healthy"));
        assert!(health.map_available);
    }

    #[tokio::test]
    async fn test_health_degraded_when_backend_down() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health-check"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let Json(health) = health_check(State(AppState::for_backend(&server.uri(), None))).await;
        assert_eq!(health.status, "degraded");
        assert!(!health.backend);
        assert!(!health.map_available);
    }

    #[tokio::test]
    async fn test_reload_refetches_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health-check"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "healthy" })))
            .expect(2)
            .mount(&server)
            .await;

        let state = AppState::for_backend(&server.uri(), None);
        health_check(State(state.clone())).await;
        health_check(State(state.clone())).await;
        assert_eq!(reload(State(state.clone())).await, StatusCode::NO_CONTENT);
        health_check(State(state)).await;
    }
}
