use std::any::Any;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{rejection::BytesRejection, rejection::QueryRejection, DefaultBodyLimit, Query, State},
    http::{Method, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, debug_span, error, info, warn, Span};

use chatsync_shared::constants::{DEFAULT_LIST_LIMIT, SELF_SENDER_NAME, SEND_TIMEOUT_SECS};
use chatsync_shared::parse_user_or_jid;
use chatsync_store::{Chat, ListMessagesParams, Message, SearchMessagesParams, UpsertMessageParams};

use crate::error::ApiError;
use crate::guard::{request_guard_middleware, RequestGuard};
use crate::state::AppState;
use crate::store::blocking;

pub const SEND_TIMEOUT: Duration = Duration::from_secs(SEND_TIMEOUT_SECS);

pub fn build_router(state: AppState, guard: RequestGuard, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AnyOrigin);
    let panic_span = state.span.clone();
    let request_span = state.span.clone();

    Router::new()
        .route("/ping", any(ping))
        .route("/status", get(status).fallback(method_not_allowed))
        .route("/chats", get(list_chats).fallback(method_not_allowed))
        .route("/messages", get(list_messages).fallback(method_not_allowed))
        .route(
            "/search",
            get(search_get).post(search_post).fallback(method_not_allowed),
        )
        .route("/send", post(send).fallback(method_not_allowed))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(middleware::from_fn_with_state(guard, request_guard_middleware))
        .layer(CatchPanicLayer::custom(move |err| panic_response(&panic_span, err)))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http().make_span_with(move |req: &Request<Body>| {
                debug_span!(parent: &request_span, "request", method = %req.method(), uri = %req.uri())
            }),
        )
        .with_state(state)
}

// ─── Wire types ───

#[derive(Debug, Serialize, Deserialize)]
pub struct PingResponse {
    pub ok: bool,
    pub pong: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub ok: bool,
    pub sync_running: bool,
    pub client_connected: bool,
    pub chats_count: i64,
    pub messages_count: i64,
    pub uptime: String,
    pub fts_enabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatJson {
    pub jid: String,
    pub kind: String,
    pub name: String,
    pub last_message_ts: String,
}

impl From<Chat> for ChatJson {
    fn from(c: Chat) -> Self {
        Self {
            jid: c.jid,
            kind: c.kind.as_str().to_string(),
            name: c.name,
            last_message_ts: format_timestamp(c.last_message_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatsResponse {
    pub ok: bool,
    pub chats: Vec<ChatJson>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageJson {
    pub chat_jid: String,
    pub chat_name: String,
    pub msg_id: String,
    pub sender_jid: String,
    pub sender_name: String,
    pub timestamp: String,
    pub from_me: bool,
    pub text: String,
    pub display_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

impl From<Message> for MessageJson {
    fn from(m: Message) -> Self {
        Self {
            chat_jid: m.chat_jid,
            chat_name: m.chat_name,
            msg_id: m.msg_id,
            sender_jid: m.sender_jid,
            sender_name: m.sender_name,
            timestamp: format_timestamp(m.timestamp),
            from_me: m.from_me,
            text: m.text,
            display_text: m.display_text,
            media_type: m.media_type.filter(|t| !t.is_empty()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub ok: bool,
    pub messages: Vec<MessageJson>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub ok: bool,
    pub results: Vec<MessageJson>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendResponse {
    pub ok: bool,
    pub message_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChatsQuery {
    query: Option<String>,
    limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MessagesQuery {
    chat_jid: Option<String>,
    limit: Option<String>,
    before: Option<String>,
    after: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    query: Option<String>,
    chat_jid: Option<String>,
    limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchRequest {
    #[serde(default)]
    query: String,
    #[serde(default)]
    chat_jid: String,
    #[serde(default)]
    limit: i64,
}

/// `chat_jid` is accepted as an alias of `to`.
#[derive(Debug, Default, Deserialize)]
struct SendRequest {
    #[serde(default)]
    to: String,
    #[serde(default)]
    chat_jid: String,
    #[serde(default)]
    message: String,
}

// ─── Handlers ───

async fn ping() -> Json<PingResponse> {
    Json(PingResponse { ok: true, pong: true })
}

async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let client_connected = state
        .client
        .snapshot()
        .map(|client| client.is_connected())
        .unwrap_or(false);

    // Counts degrade to zero rather than failing the whole report.
    let span = state.span.clone();
    let (chats_count, messages_count, fts_enabled) = blocking(&state.store, move |store| {
        let chats = store.count_chats().unwrap_or_else(|e| {
            debug!(parent: &span, error = %e, "chat count failed");
            0
        });
        let messages = store.count_messages().unwrap_or_else(|e| {
            debug!(parent: &span, error = %e, "message count failed");
            0
        });
        (chats, messages, store.has_fts())
    })
    .await?;

    Ok(Json(StatusResponse {
        ok: true,
        sync_running: state.sync_running.get(),
        client_connected,
        chats_count,
        messages_count,
        uptime: format_uptime(state.started_at.elapsed()),
        fts_enabled,
    }))
}

async fn list_chats(
    State(state): State<AppState>,
    query: Result<Query<ChatsQuery>, QueryRejection>,
) -> Result<Json<ChatsResponse>, ApiError> {
    let Query(q) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let filter = q.query.unwrap_or_default();
    let limit = parse_limit(q.limit.as_deref());

    let chats = blocking(&state.store, move |store| store.list_chats(&filter, limit)).await??;

    Ok(Json(ChatsResponse {
        ok: true,
        chats: chats.into_iter().map(ChatJson::from).collect(),
    }))
}

async fn list_messages(
    State(state): State<AppState>,
    query: Result<Query<MessagesQuery>, QueryRejection>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let Query(q) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let chat_jid = q.chat_jid.as_deref().map(str::trim).unwrap_or_default();
    if chat_jid.is_empty() {
        return Err(ApiError::BadRequest("chat_jid is required".into()));
    }

    let params = ListMessagesParams {
        chat_jid: chat_jid.to_string(),
        limit: parse_limit(q.limit.as_deref()),
        before: q.before.as_deref().and_then(parse_timestamp),
        after: q.after.as_deref().and_then(parse_timestamp),
    };

    let messages = blocking(&state.store, move |store| store.list_messages(&params)).await??;

    Ok(Json(MessagesResponse {
        ok: true,
        messages: messages.into_iter().map(MessageJson::from).collect(),
    }))
}

async fn search_get(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Query(q) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let req = SearchRequest {
        query: q.query.unwrap_or_default(),
        chat_jid: q.chat_jid.unwrap_or_default(),
        limit: q
            .limit
            .as_deref()
            .and_then(|l| l.trim().parse().ok())
            .unwrap_or(0),
    };
    run_search(state, req).await
}

async fn search_post(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let req: SearchRequest = decode_json(body)?;
    run_search(state, req).await
}

async fn run_search(state: AppState, req: SearchRequest) -> Result<Json<SearchResponse>, ApiError> {
    if req.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query is required".into()));
    }

    let chat_jid = req.chat_jid.trim();
    let params = SearchMessagesParams {
        query: req.query,
        chat_jid: (!chat_jid.is_empty()).then(|| chat_jid.to_string()),
        limit: positive_or_default(req.limit),
    };

    let results = blocking(&state.store, move |store| store.search_messages(&params)).await??;

    Ok(Json(SearchResponse {
        ok: true,
        results: results.into_iter().map(MessageJson::from).collect(),
    }))
}

async fn send(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<SendResponse>, ApiError> {
    // Snapshot the binding; the lock is released before any network call.
    let client = state.client.connected().ok_or(ApiError::ClientUnavailable)?;

    let req: SendRequest = decode_json(body)?;

    let to = match req.to.trim() {
        "" => req.chat_jid.trim(),
        to => to,
    };
    if to.is_empty() {
        return Err(ApiError::BadRequest("to or chat_jid is required".into()));
    }
    if req.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message is required".into()));
    }
    let jid = parse_user_or_jid(to)
        .map_err(|e| ApiError::BadRequest(format!("invalid recipient: {e}")))?;

    // The whole exchange with the client shares one deadline. Dropping this
    // future (caller hung up) cancels the outbound call as well.
    let deadline = tokio::time::Instant::now() + SEND_TIMEOUT;

    let message_id = match tokio::time::timeout_at(deadline, client.send_text(&jid, &req.message)).await {
        Ok(Ok(id)) => id,
        Ok(Err(e)) => {
            error!(parent: &state.span, error = %e, to = %to, "Failed to send message via RPC");
            return Err(ApiError::SendFailed(e.to_string()));
        }
        Err(_) => {
            error!(parent: &state.span, to = %to, timeout = ?SEND_TIMEOUT, "Send timed out");
            return Err(ApiError::SendFailed("deadline exceeded".into()));
        }
    };

    info!(parent: &state.span, to = %to, msg_id = %message_id, "Message sent via RPC");

    let chat_name = tokio::time::timeout_at(deadline, client.resolve_chat_name(&jid, ""))
        .await
        .unwrap_or_default();

    let chat_jid = jid.to_string();
    let kind = jid.chat_kind();
    let now = Utc::now();
    let params = UpsertMessageParams {
        chat_jid: chat_jid.clone(),
        chat_name: chat_name.clone(),
        msg_id: message_id.clone(),
        sender_jid: String::new(),
        sender_name: SELF_SENDER_NAME.to_string(),
        timestamp: now,
        from_me: true,
        text: req.message,
        media_type: None,
        display_text: None,
    };

    // Best effort: the send already succeeded, so history failures are
    // logged and never reported to the caller.
    let span = state.span.clone();
    let persisted = blocking(&state.store, move |store| {
        if let Err(e) = store.upsert_chat(&chat_jid, kind, &chat_name, now) {
            warn!(parent: &span, error = %e, chat = %chat_jid, "Failed to record chat for sent message");
        }
        if let Err(e) = store.upsert_message(&params) {
            warn!(parent: &span, error = %e, chat = %chat_jid, "Failed to record sent message");
        }
    })
    .await;
    if let Err(e) = persisted {
        warn!(parent: &state.span, error = %e, "Failed to record sent message");
    }

    Ok(Json(SendResponse {
        ok: true,
        message_id,
    }))
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

fn panic_response(span: &Span, err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("handler panicked");
    error!(parent: span, panic = %detail, "RPC handler panicked");
    ApiError::Internal(detail.to_string()).into_response()
}

// ─── Helpers ───

fn decode_json<T: DeserializeOwned>(body: Result<Bytes, BytesRejection>) -> Result<T, ApiError> {
    let body = body.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest(e.body_text())
        }
    })?;
    serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(format!("invalid JSON: {e}")))
}

/// Positive integers are taken as-is; anything else keeps the default.
fn parse_limit(raw: Option<&str>) -> usize {
    positive_or_default(raw.and_then(|l| l.trim().parse().ok()).unwrap_or(0))
}

fn positive_or_default(limit: i64) -> usize {
    if limit > 0 {
        usize::try_from(limit).unwrap_or(usize::MAX)
    } else {
        DEFAULT_LIST_LIMIT
    }
}

/// RFC 3339 with whole seconds and `Z` for UTC.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Unparsable bounds are ignored rather than rejected.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Render an uptime rounded to whole seconds: `6s`, `4m5s`, `1h2m3s`.
pub fn format_uptime(elapsed: Duration) -> String {
    let secs = (elapsed.as_millis() + 500) / 1000;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h{m}m{s}s")
    } else if m > 0 {
        format!("{m}m{s}s")
    } else {
        format!("{s}s")
    }
}
