use std::collections::HashMap;

use anyhow::Context;
use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Query, Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::any,
};
use serde::Serialize;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::config::Config;
use fittrack_core::db::DbConfig;
use fittrack_core::event::{self, FunctionEvent, FunctionResponse};
use fittrack_core::router::JSON_HEADERS;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Clone)]
struct AppState {
    db: DbConfig,
    user_id: i64,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

/// Failures of the adapter itself; the handler reports its own errors in-band.
struct ApiError(anyhow::Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        tracing::error!("adapter error: {err:#}");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
    }
}

fn json_error(status: StatusCode, error: String) -> Response {
    let mut response = (status, Json(ErrorResponse { error })).into_response();
    for &(name, value) in JSON_HEADERS {
        response
            .headers_mut()
            .insert(name, HeaderValue::from_static(value));
    }
    response
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

// --- Middleware ---

/// Responses produced outside the function (body limit, unrouted paths) get
/// the same JSON error shape and CORS headers as the function's own.
async fn json_error_fallback(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
    {
        return response;
    }
    let status = response.status();
    let reason = status.canonical_reason().unwrap_or("Request failed");
    json_error(status, reason.to_string())
}

// --- Handler ---

/// Turns the HTTP request into a [`FunctionEvent`] and runs it on the
/// blocking pool, since every invocation does synchronous SQLite work.
async fn invoke_function(
    State(state): State<AppState>,
    method: Method,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let body = String::from_utf8(body.to_vec()).context("request body is not valid UTF-8")?;
    let event = FunctionEvent {
        http_method: Some(method.as_str().to_string()),
        query_string_parameters: Some(params),
        body: (!body.is_empty()).then_some(body),
    };

    let AppState { db, user_id } = state;
    let response = tokio::task::spawn_blocking(move || event::invoke(&db, user_id, event))
        .await
        .context("handler task failed")?;

    into_http(response).map_err(ApiError::from)
}

fn into_http(response: FunctionResponse) -> anyhow::Result<Response> {
    let mut builder = Response::builder().status(response.status_code);
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Body::from(response.body))
        .context("failed to build response")
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", any(invoke_function))
        .route("/api", any(invoke_function))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(json_error_fallback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(config: &Config, port: u16, bind: &str) -> anyhow::Result<()> {
    let db = config.db_config();
    // Fail fast on an unusable database instead of on the first request.
    db.connect()?;

    let state = AppState {
        db,
        user_id: config.user_id,
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    tracing::info!(
        database = %config.db_path.display(),
        user_id = config.user_id,
        "listening on http://{bind}:{port}"
    );
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fittrack_core::db::DEFAULT_USER_ID;
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_state() -> (TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState {
            db: DbConfig::new(dir.path().join("fittrack.db")),
            user_id: DEFAULT_USER_ID,
        };
        (dir, state)
    }

    fn test_app() -> (TempDir, Router) {
        let (dir, state) = test_state();
        (dir, build_router(state))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn dashboard_returns_json_with_cors() {
        let (_dir, app) = test_app();

        let response = app
            .oneshot(
                axum::http::Request::get("/?action=dashboard")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(response.headers()["content-type"], "application/json");

        let json = body_json(response).await;
        assert_eq!(json["calories_consumed"], 0);
        assert_eq!(json["workout_minutes"], 0);
    }

    #[tokio::test]
    async fn options_returns_empty_preflight() {
        let (_dir, app) = test_app();

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("OPTIONS")
                    .uri("/api?action=anything")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-max-age"], "86400");
        assert_eq!(
            response.headers()["access-control-allow-headers"],
            "Content-Type, X-User-Id"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn post_meal_then_read_it_back() {
        let (_dir, state) = test_state();

        let response = build_router(state.clone())
            .oneshot(
                axum::http::Request::post("/api?action=meal")
                    .header("Content-Type", "application/json")
                    .body(Body::from(
                        r#"{"meal_type":"lunch","name":"Salad","calories":300}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["message"], "Meal added");
        assert!(json["id"].is_i64());

        let response = build_router(state)
            .oneshot(
                axum::http::Request::get("/api?action=meals")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let meals = body_json(response).await;
        assert_eq!(meals[0]["name"], "Salad");
        assert_eq!(meals[0]["carbs"], 0.0);
    }

    #[tokio::test]
    async fn delete_is_not_found() {
        let (_dir, app) = test_app();

        let response = app
            .oneshot(
                axum::http::Request::delete("/?action=meal")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Not found");
    }

    #[tokio::test]
    async fn malformed_body_is_500() {
        let (_dir, app) = test_app();

        let response = app
            .oneshot(
                axum::http::Request::post("/?action=weight")
                    .body(Body::from("{oops"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("JSON"));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let (_dir, app) = test_app();
        let content = "x".repeat(BODY_LIMIT + 1);

        let response = app
            .oneshot(
                axum::http::Request::post("/?action=post")
                    .body(Body::from(content))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(response.headers()["content-type"], "application/json");
        let json = body_json(response).await;
        assert_eq!(json["error"], "Payload Too Large");
    }

    #[tokio::test]
    async fn oversized_content_length_gets_json_error() {
        let (_dir, app) = test_app();
        let content = "x".repeat(BODY_LIMIT + 1);

        let response = app
            .oneshot(
                axum::http::Request::post("/?action=post")
                    .header("Content-Length", content.len())
                    .body(Body::from(content))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn non_utf8_body_is_500_with_cors() {
        let (_dir, app) = test_app();

        let response = app
            .oneshot(
                axum::http::Request::post("/?action=post")
                    .body(Body::from(vec![0xff_u8, 0xfe]))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(response.headers()["content-type"], "application/json");
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("UTF-8"));
    }

    #[tokio::test]
    async fn other_paths_are_unrouted() {
        let (_dir, app) = test_app();

        let response = app
            .oneshot(
                axum::http::Request::get("/elsewhere?action=dashboard")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }
}
