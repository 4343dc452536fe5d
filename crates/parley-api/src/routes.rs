//! HTTP routes for the messaging API.
//!
//! Authentication happens upstream: the proxy in front of this service sets
//! `x-user-id` to the authenticated user's id and the value is trusted as is.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use parley_core::models::{Message, Thread, ThreadDetail, ThreadId, ThreadSummary, UserId};
use parley_core::{Config, Messenger};

/// Header carrying the authenticated caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub messenger: Messenger,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .route("/", get(root))
        .route("/health", get(health));

    if state.config.messaging_enabled {
        app = app
            .route("/messages", get(list_threads))
            .route("/messages/direct", post(start_direct_conversation))
            .route("/messages/{thread_id}", get(show_thread))
            .route("/messages/{thread_id}/messages", post(send_message_to_thread))
            .route("/messages/{thread_id}/read", post(mark_read));
    }

    app.layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The authenticated user making the request.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub UserId);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<UserId>().ok())
            .map(Caller)
            .ok_or(ApiError::Unauthenticated)
    }
}

/// Errors surfaced to HTTP clients.
#[derive(Debug)]
pub enum ApiError {
    Unauthenticated,
    NotFound(&'static str),
    BadRequest(String),
    Core(parley_core::Error),
}

impl From<parley_core::Error> for ApiError {
    fn from(err: parley_core::Error) -> Self {
        ApiError::Core(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    retryable: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use parley_core::Error;

        let (status, message, retryable) = match self {
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "authentication required".to_string(),
                false,
            ),
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, what.to_string(), false),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message, false),
            ApiError::Core(Error::InvalidArgument(message)) => {
                (StatusCode::BAD_REQUEST, message, false)
            }
            ApiError::Core(err @ Error::Conflict(_)) => {
                (StatusCode::CONFLICT, err.to_string(), true)
            }
            ApiError::Core(Error::Unavailable(err)) => {
                error!("Store unavailable: {err}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "messaging store unavailable".to_string(),
                    true,
                )
            }
            ApiError::Core(err) => {
                error!("Unexpected messaging error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                    false,
                )
            }
        };

        (
            status,
            Json(ErrorBody {
                error: message,
                retryable,
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Debug, Deserialize)]
struct InboxQuery {
    limit: Option<i64>,
}

#[derive(Serialize)]
struct InboxResponse {
    threads: Vec<ThreadSummary>,
    unread_total: i64,
}

async fn list_threads(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Query(params): Query<InboxQuery>,
) -> Result<Json<InboxResponse>, ApiError> {
    let limit = state.config.thread_limit(params.limit);
    let threads = state
        .messenger
        .list_threads_for_user(user_id, Some(limit))
        .await?;
    let unread_total = state.messenger.unread_total(user_id).await?;
    Ok(Json(InboxResponse {
        threads,
        unread_total,
    }))
}

#[derive(Debug, Deserialize)]
struct StartConversation {
    target_user_id: UserId,
}

async fn start_direct_conversation(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Json(req): Json<StartConversation>,
) -> Result<Json<Thread>, ApiError> {
    let thread = state
        .messenger
        .ensure_direct_thread(user_id, req.target_user_id)
        .await?;
    Ok(Json(thread))
}

async fn show_thread(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(thread_id): Path<ThreadId>,
) -> Result<Json<ThreadDetail>, ApiError> {
    state
        .messenger
        .load_thread_for_user(user_id, thread_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("thread not found"))
}

#[derive(Debug, Deserialize)]
struct PostMessage {
    body: String,
}

async fn send_message_to_thread(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(thread_id): Path<ThreadId>,
    Json(req): Json<PostMessage>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let detail = state
        .messenger
        .load_thread_for_user(user_id, thread_id)
        .await?
        .ok_or(ApiError::NotFound("thread not found"))?;
    let recipient = detail
        .counterpart()
        .map(|p| p.user_id)
        .ok_or_else(|| ApiError::BadRequest("no recipient found".to_string()))?;

    let sent = state
        .messenger
        .send_direct_message(user_id, recipient, &req.body)
        .await?;
    Ok((StatusCode::CREATED, Json(sent.message)))
}

async fn mark_read(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(thread_id): Path<ThreadId>,
) -> Result<StatusCode, ApiError> {
    if state.messenger.mark_thread_read(user_id, thread_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("thread not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use parley_core::Database;
    use tower::ServiceExt;

    async fn test_state(messaging_enabled: bool) -> AppState {
        let path = std::env::temp_dir().join(format!("parley-api-test-{}.db", uuid::Uuid::new_v4()));
        let db = Database::open(&path).await.expect("open db");
        let config = Config {
            database: path,
            messaging_enabled,
            ..Config::default()
        };
        AppState {
            config: Arc::new(config),
            messenger: Messenger::new(db),
        }
    }

    fn request(method: &str, uri: &str, user: Option<UserId>, body: Option<serde_json::Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user.to_string());
        }
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(req).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }

    #[tokio::test]
    async fn health_is_open() {
        let app = router(test_state(true).await);
        let (status, body) = send(&app, request("GET", "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn missing_identity_is_unauthorized() {
        let app = router(test_state(true).await);
        let (status, _) = send(&app, request("GET", "/messages", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn disabled_messaging_hides_routes() {
        let app = router(test_state(false).await);
        let (status, _) = send(&app, request("GET", "/messages", Some(1), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn conversation_flow() {
        let app = router(test_state(true).await);

        let (status, thread) = send(
            &app,
            request(
                "POST",
                "/messages/direct",
                Some(1),
                Some(serde_json::json!({"target_user_id": 2})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let thread_id = thread["id"].as_i64().expect("thread id");

        let (status, message) = send(
            &app,
            request(
                "POST",
                &format!("/messages/{thread_id}/messages"),
                Some(1),
                Some(serde_json::json!({"body": "  hello  "})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(message["body"], "hello");
        assert_eq!(message["sender_user_id"], 1);

        let (status, inbox) = send(&app, request("GET", "/messages", Some(2), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(inbox["unread_total"], 1);
        assert_eq!(inbox["threads"][0]["last_message"]["body"], "hello");

        let (status, _) = send(
            &app,
            request("POST", &format!("/messages/{thread_id}/read"), Some(2), None),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, detail) = send(
            &app,
            request("GET", &format!("/messages/{thread_id}"), Some(2), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["viewer"]["unread_count"], 0);
        assert_eq!(detail["messages"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn outsiders_get_not_found() {
        let state = test_state(true).await;
        let sent = state
            .messenger
            .send_direct_message(1, 2, "private")
            .await
            .expect("send");
        let app = router(state);
        let thread_id = sent.thread.id;

        let (status, _) = send(
            &app,
            request("GET", &format!("/messages/{thread_id}"), Some(3), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            request(
                "POST",
                &format!("/messages/{thread_id}/messages"),
                Some(3),
                Some(serde_json::json!({"body": "let me in"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            request("POST", &format!("/messages/{thread_id}/read"), Some(3), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn blank_body_is_bad_request() {
        let state = test_state(true).await;
        let thread = state
            .messenger
            .ensure_direct_thread(1, 2)
            .await
            .expect("ensure");
        let app = router(state);

        let (status, body) = send(
            &app,
            request(
                "POST",
                &format!("/messages/{}/messages", thread.id),
                Some(1),
                Some(serde_json::json!({"body": "   "})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["retryable"], false);
    }

    #[tokio::test]
    async fn self_conversation_is_bad_request() {
        let app = router(test_state(true).await);
        let (status, _) = send(
            &app,
            request(
                "POST",
                "/messages/direct",
                Some(5),
                Some(serde_json::json!({"target_user_id": 5})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn conflict_maps_to_retryable_409() {
        let response =
            ApiError::Core(parley_core::Error::Conflict("1:2".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn unavailable_maps_to_503() {
        let response =
            ApiError::Core(parley_core::Error::Unavailable(sqlx_pool_closed())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    fn sqlx_pool_closed() -> parley_core::db::StoreError {
        parley_core::db::StoreError::PoolClosed
    }
}
