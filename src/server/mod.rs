// SPDX-License-Identifier: MIT

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::{CompileError, EvaluationError, PolicyError};
use crate::service::{InferRequest, InferResponse, InferService};

/// Shared state for the HTTP handlers
pub struct AppState {
    pub service: InferService,
}

/// Build the router serving the inference API
pub fn router(service: InferService) -> Router {
    let state = Arc::new(AppState { service });

    Router::new()
        .route("/api/health", get(health_check))
        .route("/infer", post(infer))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped
pub async fn serve(addr: SocketAddr, service: InferService) -> Result<(), PolicyError> {
    let listener = TcpListener::bind(addr).await?;
    serve_with_listener(listener, service).await
}

/// Serve on an already bound listener
pub async fn serve_with_listener(
    listener: TcpListener,
    service: InferService,
) -> Result<(), PolicyError> {
    log::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(service)).await?;
    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let cache = state.service.cache();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "cache": {
            "entries": cache.len(),
            "capacity": cache.capacity(),
        }
    }))
}

async fn infer(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<InferRequest>, JsonRejection>,
) -> Result<Json<InferResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        log::warn!("Rejected inference request: {}", rejection.body_text());
        ApiError::InvalidBody(rejection.body_text())
    })?;

    state.service.infer(&request).map(Json).map_err(|e| {
        log::error!("Inference failed: {}", e);
        ApiError::Policy(e)
    })
}

/// Failure rendered as a JSON error body
#[derive(Debug)]
pub enum ApiError {
    /// The request body was not a valid inference request
    InvalidBody(String),
    Policy(PolicyError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::InvalidBody(message) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "invalid_json", "message": message }),
            ),
            ApiError::Policy(e) => (e.status_code(), error_body(&e)),
        };
        (status, Json(body)).into_response()
    }
}

fn error_body(e: &PolicyError) -> Value {
    let mut body = json!({ "error": e.kind(), "message": e.to_string() });

    match e {
        PolicyError::Compile(CompileError::Syntax { line, column, .. }) => {
            body["line"] = json!(line);
            body["column"] = json!(column);
        }
        PolicyError::Compile(CompileError::InvalidCondition { from, to, text, .. }) => {
            body["from"] = json!(from);
            body["to"] = json!(to);
            body["condition"] = json!(text);
        }
        PolicyError::Compile(CompileError::CyclicGraph { state })
        | PolicyError::Evaluation(EvaluationError::Stuck { state }) => {
            body["state"] = json!(state);
        }
        _ => {}
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stuck_body_carries_state() {
        let err: PolicyError = EvaluationError::Stuck {
            state: "check_income".to_string(),
        }
        .into();
        let body = error_body(&err);

        assert_eq!(body["error"], json!("stuck"));
        assert_eq!(body["state"], json!("check_income"));
    }

    #[test]
    fn test_syntax_body_carries_position() {
        let err: PolicyError = CompileError::syntax(2, 5, "expected node id").into();
        let body = error_body(&err);

        assert_eq!(body["error"], json!("syntax"));
        assert_eq!(body["line"], json!(2));
        assert_eq!(body["column"], json!(5));
    }

    #[test]
    fn test_invalid_body_is_bad_request() {
        let response = ApiError::InvalidBody("missing field `policy_dot`".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let err: PolicyError = EvaluationError::Stuck {
            state: "start".to_string(),
        }
        .into();
        let response = ApiError::Policy(err).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
