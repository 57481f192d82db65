use anyhow::{Context, Result};
use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::models::{ErrorResponse, StyleRulesParams};
use super::state::RelayState;
use crate::error::ApiError;
use crate::gateway::API_KEY_HEADER;
use crate::settings::Settings;

type RelayResult = Result<Json<Value>, (StatusCode, Json<ErrorResponse>)>;

pub async fn run_server(settings: Settings, addr: String) -> Result<()> {
    let http = reqwest::Client::builder()
        .user_agent(concat!("translate-compare/", env!("CARGO_PKG_VERSION")))
        .build()
        .with_context(|| "failed to build HTTP client")?;
    let state = Arc::new(RelayState::new(http, &settings.upstream_base_url));
    let app = router(state.clone());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind relay address {}", addr))?;
    info!(
        "relay listening on {} (upstream {})",
        addr,
        state.upstream_base_url()
    );
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/translate", post(translate))
        .route("/style-rules", get(style_rules))
        .with_state(state)
        .layer(axum::middleware::from_fn(cors_middleware))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type,x-api-key"),
    );
}

async fn translate(State(state): State<Arc<RelayState>>, body: Bytes) -> RelayResult {
    let parsed: Value = serde_json::from_slice(&body).map_err(|err| {
        internal_error(format!("invalid JSON body: {}", err))
    })?;
    let Value::Object(mut payload) = parsed else {
        return Err(missing_key());
    };
    let key = match payload.remove("apiKey") {
        Some(Value::String(key)) if !key.trim().is_empty() => key,
        _ => return Err(missing_key()),
    };

    let payload = Value::Object(payload);
    debug!("relaying translate request: {}", payload);
    state
        .upstream
        .forward_translate(&key, &payload)
        .await
        .map(Json)
        .map_err(relay_error)
}

async fn style_rules(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    Query(params): Query<StyleRulesParams>,
) -> RelayResult {
    let key = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(missing_key)?
        .to_string();

    let query = params.into_pairs();
    debug!("relaying style rules request: {:?}", query);
    state
        .upstream
        .forward_style_rules(&key, &query)
        .await
        .map(Json)
        .map_err(relay_error)
}

fn missing_key() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: "API key is required".to_string(),
            details: None,
        }),
    )
}

fn internal_error(details: String) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Internal server error".to_string(),
            details: Some(details),
        }),
    )
}

/// Upstream rejections keep their status; anything else is a relay fault.
fn relay_error(err: ApiError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        ApiError::Validation(message) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: message,
                details: None,
            }),
        ),
        ApiError::Upstream {
            status,
            message,
            details,
        } => {
            warn!("upstream rejected relayed request: {} ({})", message, status);
            (
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                Json(ErrorResponse {
                    error: message,
                    details,
                }),
            )
        }
        other => {
            warn!("relay failure: {}", other);
            internal_error(other.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_faults_become_internal_server_errors() {
        let (status, Json(body)) = relay_error(ApiError::Internal("template".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal server error");
        assert_eq!(body.details.as_deref(), Some("Internal error: template"));
    }

    #[test]
    fn validation_failures_stay_client_errors() {
        let (status, Json(body)) = relay_error(ApiError::validation("API key is required"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "API key is required");
        assert!(body.details.is_none());
    }
}
