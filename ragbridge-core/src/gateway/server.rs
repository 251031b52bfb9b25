//! HTTP gateway server built on axum.

use super::GatewayConfig;
use crate::chat::{AskQuestion, ChatAnswer, ChatService, generate_correlation_id};
use crate::config::BridgeConfig;
use crate::error::{ChatError, TransportError};
use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Request, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Header carrying the correlation id, inbound and outbound.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Correlation id stamped on each request by the middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

/// Shared state for the gateway handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: ChatService,
    pub service_name: String,
}

impl AppState {
    pub fn new(service: ChatService, config: &GatewayConfig) -> Self {
        Self {
            service,
            service_name: config.service_name.clone(),
        }
    }
}

/// Error body returned by the API: `{error: {code, message}, correlationId}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub correlation_id: String,
}

impl ApiError {
    pub fn from_chat(err: &ChatError, correlation_id: &str) -> Self {
        let message = match err {
            ChatError::InvalidQuestion { reason } => reason.clone(),
            ChatError::Upstream { message }
            | ChatError::Transport(TransportError::Upstream { message, .. }) => message.clone(),
            other => other.to_string(),
        };
        Self {
            status: StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_GATEWAY),
            code: err.code(),
            message,
            correlation_id: correlation_id.to_string(),
        }
    }

    fn bad_request(rejection: &JsonRejection, correlation_id: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "INVALID_REQUEST",
            message: rejection.body_text(),
            correlation_id: correlation_id.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {"code": self.code, "message": self.message},
            "correlationId": self.correlation_id,
        });
        (self.status, Json(body)).into_response()
    }
}

/// Build the gateway router.
pub fn router(state: AppState) -> Router {
    router_with_limit(state, GatewayConfig::default().max_body_bytes)
}

fn router_with_limit(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/chat/ask", post(ask_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(middleware::from_fn(correlation_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Tag the request with a correlation id and echo it on the response.
async fn correlation_middleware(mut req: Request, next: Next) -> Response {
    let correlation_id = req
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or_else(generate_correlation_id, str::to_string);

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut()
        .insert(CorrelationId(correlation_id.clone()));

    let started = Instant::now();
    let mut response = next.run(req).await;

    if path.starts_with("/api") {
        info!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Handled API request"
        );
    }
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

/// Liveness probe.
async fn root_handler() -> impl IntoResponse {
    Json(json!({"ok": true}))
}

/// Health check endpoint.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({"ok": true, "service": state.service_name}))
}

async fn ask_handler(
    State(state): State<AppState>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
    body: Result<Json<AskQuestion>, JsonRejection>,
) -> Result<Json<ChatAnswer>, ApiError> {
    let Json(mut ask) = body.map_err(|rejection| {
        warn!(correlation_id = %correlation_id, error = %rejection, "Rejected ask body");
        ApiError::bad_request(&rejection, &correlation_id)
    })?;
    ask.correlation_id = Some(correlation_id.clone());

    state
        .service
        .ask(ask)
        .await
        .map(Json)
        .map_err(|err| {
            warn!(correlation_id = %correlation_id, error = %err, "Ask failed");
            ApiError::from_chat(&err, &correlation_id)
        })
}

/// Start the gateway on the configured address.
///
/// Runs until the process receives Ctrl-C.
pub async fn run(config: &GatewayConfig, service: ChatService) -> crate::Result<()> {
    let app = router_with_limit(AppState::new(service, config), config.max_body_bytes);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, service = %config.service_name, "Gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

/// Build the chat service from `config` and serve it on `config.gateway`.
pub async fn serve(config: &BridgeConfig) -> crate::Result<()> {
    let service = ChatService::from_config(config)?;
    run(&config.gateway, service).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestrationSettings;
    use crate::transport::MockTransport;
    use axum::body::Body;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn make_state(body: serde_json::Value) -> AppState {
        let service = ChatService::new(
            OrchestrationSettings::default(),
            false,
            Arc::new(MockTransport::with_body(body)),
        );
        AppState::new(service, &GatewayConfig::default())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = router(make_state(json!(null)));

        let req = axum::http::Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let resp = ServiceExt::<axum::http::Request<Body>>::oneshot(app, req)
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert!(resp.headers().contains_key(CORRELATION_HEADER));

        let body = axum::body::to_bytes(resp.into_body(), 10_000)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["service"], "ragbridge");
    }

    #[tokio::test]
    async fn test_incoming_correlation_id_echoed() {
        let app = router(make_state(json!(null)));
        let req = axum::http::Request::builder()
            .uri("/")
            .header(CORRELATION_HEADER, "corr-from-client")
            .body(Body::empty())
            .unwrap();
        let resp = ServiceExt::<axum::http::Request<Body>>::oneshot(app, req)
            .await
            .unwrap();
        assert_eq!(
            resp.headers().get(CORRELATION_HEADER).unwrap(),
            "corr-from-client"
        );
    }

    #[tokio::test]
    async fn test_run_reports_bind_failure() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = GatewayConfig {
            port: taken.local_addr().unwrap().port(),
            ..GatewayConfig::default()
        };
        let service = ChatService::new(
            OrchestrationSettings::default(),
            true,
            Arc::new(MockTransport::with_body(json!(null))),
        );
        let err = run(&config, service).await.unwrap_err();
        assert!(matches!(err, crate::BridgeError::Io(_)));
    }

    #[test]
    fn test_api_error_from_chat_error() {
        let err = ChatError::Transport(TransportError::Upstream {
            status: 503,
            message: "down".into(),
        });
        let api = ApiError::from_chat(&err, "corr-1");
        assert_eq!(api.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(api.code, "UPSTREAM_FAILED");
        assert_eq!(api.message, "down");

        let err = ChatError::InvalidQuestion {
            reason: "question is required".into(),
        };
        let api = ApiError::from_chat(&err, "corr-2");
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.message, "question is required");
    }
}
