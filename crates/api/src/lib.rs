mod rate_limit;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::body::Body;
use axum::extract::{Json, Path, State};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use optimizer_agents::{ChatConfig, ChatError, CoordinationEvent, OptimizerChat};
use optimizer_core::{
    parse_session, route_message, ConversationState, Landing, RoleContext, SectionName,
};
use optimizer_observability::{AppMetrics, MetricsSnapshot};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::rate_limit::ClientRateLimiter;

pub const DEFAULT_API_KEY: &str = "dev-optimizer-key";
const MAX_MESSAGE_LEN: usize = 2_000;
const MAX_BODY_BYTES: usize = 32 * 1024;
const LOGIN_PAGE: &str = "login.html";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub chat: ChatConfig,
    pub api_key: String,
    pub rate_limit_window: Duration,
    pub rate_limit_max: usize,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self {
            chat: ChatConfig::from_env(),
            api_key: env::var("OPTIMIZER_API_KEY").unwrap_or_else(|_| DEFAULT_API_KEY.to_string()),
            rate_limit_window: Duration::from_secs(
                env::var("OPTIMIZER_RATE_LIMIT_WINDOW_SECONDS")
                    .ok()
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(60),
            ),
            rate_limit_max: env::var("OPTIMIZER_RATE_LIMIT_MAX")
                .ok()
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(120),
        }
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub chat: OptimizerChat,
    pub metrics: Arc<AppMetrics>,
    pub api_key: String,
    pub limiter: ClientRateLimiter,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    open_conversations: usize,
    metrics: MetricsSnapshot,
}

#[derive(Debug, Deserialize)]
struct RouteRequest {
    text: String,
    #[serde(default)]
    crisis_triggered: bool,
    #[serde(default)]
    shown_sections: Vec<SectionName>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenConversationRequest {
    #[serde(default)]
    crisis_triggered: bool,
}

#[derive(Debug, Deserialize)]
struct MessageRequest {
    text: String,
}

#[derive(Debug, Deserialize)]
struct SessionResolveRequest {
    session_json: Option<String>,
    #[serde(default = "default_allow_redirect")]
    allow_redirect: bool,
    role_context: Option<String>,
    #[serde(default)]
    nav_hrefs: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SessionResolveResponse {
    authenticated: bool,
    name: Option<String>,
    title: Option<&'static str>,
    landing: Option<Landing>,
    redirect_page: Option<&'static str>,
    visible_hrefs: Vec<String>,
}

fn default_allow_redirect() -> bool {
    true
}

pub async fn build_app() -> Result<Router> {
    Ok(build_app_with(ApiConfig::from_env()))
}

pub fn build_app_with(config: ApiConfig) -> Router {
    let metrics = AppMetrics::shared();
    let state = ApiState {
        chat: OptimizerChat::new(config.chat, metrics.clone()),
        metrics,
        api_key: config.api_key,
        limiter: ClientRateLimiter::new(config.rate_limit_window, config.rate_limit_max),
    };

    build_router(state)
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/route", post(route_preview))
        .route("/v1/conversations", post(open_conversation))
        .route("/v1/conversations/:id", get(get_conversation).delete(close_conversation))
        .route("/v1/conversations/:id/messages", post(send_message))
        .route("/v1/conversations/:id/crisis", post(trigger_crisis))
        .route("/v1/events", post(broadcast_event))
        .route("/v1/events/latest", get(latest_event))
        .route("/v1/session/resolve", post(resolve_session))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        open_conversations: state.chat.conversation_count(),
        metrics: state.metrics.snapshot(),
    };
    (StatusCode::OK, Json(payload))
}

async fn route_preview(
    State(state): State<ApiState>,
    Json(request): Json<RouteRequest>,
) -> Response {
    if let Some(rejection) = reject_long_text(&request.text) {
        return rejection;
    }

    let conversation_state = ConversationState {
        crisis_triggered: request.crisis_triggered,
        shown_sections: request.shown_sections.into_iter().collect(),
    };
    let decision = route_message(
        request.text.trim(),
        &conversation_state,
        &state.chat.config().router,
    );

    (StatusCode::OK, Json(decision)).into_response()
}

async fn open_conversation(
    State(state): State<ApiState>,
    body: Option<Json<OpenConversationRequest>>,
) -> Response {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let initial = if request.crisis_triggered {
        ConversationState::in_crisis()
    } else {
        ConversationState::new()
    };

    let conversation_id = state.chat.open_conversation_with(initial);
    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "conversation_id": conversation_id })),
    )
        .into_response()
}

async fn get_conversation(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.chat.snapshot(&id) {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(error) => chat_error_response(error),
    }
}

async fn close_conversation(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    if state.chat.close_conversation(&id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        chat_error_response(ChatError::UnknownConversation(id))
    }
}

async fn send_message(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<MessageRequest>,
) -> Response {
    if let Some(rejection) = reject_long_text(&request.text) {
        return rejection;
    }

    match state.chat.send_message(&id, request.text.trim()).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => chat_error_response(error),
    }
}

async fn trigger_crisis(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.chat.trigger_crisis(&id) {
        Ok(conversation_state) => (StatusCode::OK, Json(conversation_state)).into_response(),
        Err(error) => chat_error_response(error),
    }
}

async fn broadcast_event(
    State(state): State<ApiState>,
    Json(event): Json<CoordinationEvent>,
) -> Response {
    if event.event_type.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_event",
            "event type must not be empty",
        );
    }

    let (event, switched) = state.chat.broadcast_event(event);
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "event": event,
            "conversations_switched": switched,
        })),
    )
        .into_response()
}

async fn latest_event(State(state): State<ApiState>) -> Response {
    match state.chat.coordination().latest() {
        Some(event) => (StatusCode::OK, Json(event)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn resolve_session(Json(request): Json<SessionResolveRequest>) -> Response {
    let Some(session) = parse_session(request.session_json.as_deref()) else {
        return (
            StatusCode::OK,
            Json(SessionResolveResponse {
                authenticated: false,
                name: None,
                title: None,
                landing: None,
                redirect_page: Some(LOGIN_PAGE),
                visible_hrefs: Vec::new(),
            }),
        )
            .into_response();
    };

    let context = request.role_context.as_deref().and_then(RoleContext::parse);
    let landing = session.resolve_landing(chrono::Utc::now(), request.allow_redirect);
    let redirect_page = match landing {
        Landing::Redirect(dashboard) => Some(dashboard.page()),
        Landing::Stay => None,
    };
    let hrefs = request
        .nav_hrefs
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>();
    let visible_hrefs = session
        .visible_hrefs(&hrefs)
        .into_iter()
        .map(ToString::to_string)
        .collect();

    (
        StatusCode::OK,
        Json(SessionResolveResponse {
            authenticated: true,
            name: Some(session.name.clone()),
            title: Some(session.title(context)),
            landing: Some(landing),
            redirect_page,
            visible_hrefs,
        }),
    )
        .into_response()
}

fn reject_long_text(text: &str) -> Option<Response> {
    (text.chars().count() > MAX_MESSAGE_LEN).then(|| {
        error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            "message_too_long",
            "message exceeds the maximum length",
        )
    })
}

fn chat_error_response(error: ChatError) -> Response {
    match error {
        ChatError::UnknownConversation(_) => {
            error_response(StatusCode::NOT_FOUND, "conversation_not_found", &error.to_string())
        }
    }
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": code,
            "message": message
        })),
    )
        .into_response()
}

fn is_public_endpoint(path: &str) -> bool {
    matches!(path, "/health")
}

async fn api_key_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if request.method() == Method::OPTIONS || is_public_endpoint(path.as_str()) {
        return next.run(request).await;
    }

    let header_key = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if header_key != state.api_key {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid x-api-key",
        );
    }

    next.run(request).await
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let ip = request_ip(&request);
    if let Err(retry_after) = state.limiter.check(&ip) {
        warn!(client = %ip, "rate limit exceeded");
        let mut response = error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "rate limit exceeded for this client",
        );
        if let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().max(1).to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        return response;
    }

    next.run(request).await
}

fn request_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "local".to_string())
}

async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;

    response.headers_mut().insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response.headers_mut().insert(
        header::HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    response.headers_mut().insert(
        header::HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    response
}
