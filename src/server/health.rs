//! Keep-alive and health endpoints.
//!
//! Provides:
//! - `/`: plain liveness text for uptime pingers
//! - `/health`: "healthy" + version (for load balancers)
//! - `/health/detailed`: gateway and event bus status

use axum::extract::Extension;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use sentinel_channels::DiscordAdapter;
use sentinel_core::DisciplineEngine;
use serde::Serialize;
use std::sync::Arc;

/// Liveness text served at `/`
pub const ONLINE_TEXT: &str = "Sentinel is online!";

/// Simple health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed health response with per-component checks
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub checks: HealthChecks,
}

/// All component health checks
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub discord: ComponentHealth,
    pub event_bus: ComponentHealth,
}

/// Individual component health status
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ComponentHealth {
    fn healthy(details: serde_json::Value) -> Self {
        Self {
            status: "healthy",
            details: Some(details),
        }
    }

    fn connecting() -> Self {
        Self {
            status: "connecting",
            details: None,
        }
    }
}

async fn online() -> &'static str {
    ONLINE_TEXT
}

/// Simple health check (for load balancers)
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn detailed_health_check(
    adapter: Extension<Arc<DiscordAdapter>>,
    engine: Extension<Arc<DisciplineEngine>>,
) -> Json<DetailedHealthResponse> {
    let discord = check_discord(&adapter);
    let event_bus = ComponentHealth::healthy(serde_json::json!({
        "subscriber_count": engine.events().subscriber_count(),
    }));

    let status = if discord.status == "healthy" {
        "healthy"
    } else {
        "degraded"
    };

    Json(DetailedHealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        checks: HealthChecks { discord, event_bus },
    })
}

/// The gateway is up once the ready event has recorded the bot's id
fn check_discord(adapter: &DiscordAdapter) -> ComponentHealth {
    match adapter.bot_user_id() {
        0 => ComponentHealth::connecting(),
        id => ComponentHealth::healthy(serde_json::json!({ "bot_user_id": id.to_string() })),
    }
}

/// Create keep-alive routes
pub fn health_routes() -> Router {
    Router::new()
        .route("/", get(online))
        .route("/health", get(health_check))
}

/// Routes that need the running adapter and engine
pub fn detailed_routes(adapter: Arc<DiscordAdapter>, engine: Arc<DisciplineEngine>) -> Router {
    Router::new()
        .route("/health/detailed", get(detailed_health_check))
        .layer(Extension(adapter))
        .layer(Extension(engine))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use sentinel_channels::DiscordConfig;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_root_reports_online() {
        let response = health_routes()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], ONLINE_TEXT.as_bytes());
    }

    #[tokio::test]
    async fn test_health_returns_version() {
        let response = health_routes()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_discord_connecting_before_ready() {
        let adapter = DiscordAdapter::new(DiscordConfig::new("token"));
        let h = check_discord(&adapter);
        assert_eq!(h.status, "connecting");
        assert!(h.details.is_none());
    }

    #[test]
    fn test_health_response_serialization() {
        let resp = HealthResponse {
            status: "healthy",
            version: "0.1.0",
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("0.1.0"));
    }
}
