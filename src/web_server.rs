use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    serve, Json, Router,
};
use chrono::Utc;
use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::constants::INVALID_KEY_MESSAGE;
use crate::conversation::{ChatTurn, Role};
use crate::credential::{Credential, CredentialGate, CredentialStore};
use crate::error::ChatError;
use crate::image::context_lines;
use crate::orchestrator::{ChatMode, Orchestrator};
use crate::provider::WireMessage;
use crate::session::Session;

const PAGE_TITLE: &str = "AI ChatBot UI";
const SERVER_ERROR_MESSAGE: &str = "서버 오류가 발생했습니다.";
const IMAGE_FAILURE_MESSAGE: &str = "이미지 생성에 실패했습니다.";
const LOGIN_REQUIRED_MESSAGE: &str = "API 키 인증이 필요합니다.";
const CLIENT_PATH_NOTICE: &str =
    "서버 사이드 채팅 API는 지원되지 않습니다. 채팅은 /api/messages 경로로 요청해주세요.";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Upstream { status, .. } => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (code, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl ApiError {
    /// Relays provider status codes; everything else becomes a 500 with
    /// `fallback` as the message.
    fn relay(e: ChatError, fallback: &str) -> Self {
        error!(error = %e, "Pass-through request failed");
        match e {
            ChatError::Upstream { status, message } => ApiError::Upstream {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                message,
            },
            _ => ApiError::Internal(fallback.to_string()),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    templates: Arc<AutoReloader>,
    orchestrator: Arc<Orchestrator>,
    gate: CredentialGate,
    store: CredentialStore,
    static_dir: PathBuf,
    // The single local session; None until a key is validated or resumed.
    session: Arc<Mutex<Option<Session>>>,
}

impl AppState {
    /// Builds the state and resumes a previously stored key, if any.
    pub fn new(settings: &Settings) -> Result<Self> {
        let templates = create_minijinja_env(settings.templates_dir.clone());
        let orchestrator = Orchestrator::new(settings);
        let gate = CredentialGate::new(orchestrator.provider().clone());
        let store = CredentialStore::new(settings.credential_file.clone());
        let session = Session::resume(&store).context("Failed to read stored credential")?;

        Ok(Self {
            templates: Arc::new(templates),
            orchestrator: Arc::new(orchestrator),
            gate,
            store,
            static_dir: settings.static_dir.clone(),
            session: Arc::new(Mutex::new(session)),
        })
    }

    fn render(&self, name: &str, context: minijinja::Value) -> Result<Html<String>, ApiError> {
        self.templates
            .acquire_env()
            .and_then(|env| env.get_template(name).and_then(|tmpl| tmpl.render(context)))
            .map(Html)
            .map_err(|e| {
                error!("Failed to get or render template {}: {}", name, e);
                ApiError::Internal(SERVER_ERROR_MESSAGE.to_string())
            })
    }

    /// Credential of the active session, if `api_key` is the one it holds.
    async fn credential_for(&self, api_key: &str) -> Result<Credential, ApiError> {
        let guard = self.session.lock().await;
        match guard.as_ref() {
            Some(session) if session.credential().matches(api_key) => Ok(session.credential().clone()),
            _ => Err(ApiError::Unauthorized(LOGIN_REQUIRED_MESSAGE.to_string())),
        }
    }
}

fn create_minijinja_env(templates_dir: PathBuf) -> AutoReloader {
    AutoReloader::new(move |notifier| {
        let mut env = Environment::new();
        env.set_loader(path_loader(&templates_dir));
        notifier.watch_path(&templates_dir, true);
        Ok(env)
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Deserialize)]
struct InboundMessage {
    role: Role,
    content: String,
}

impl From<InboundMessage> for WireMessage {
    fn from(message: InboundMessage) -> Self {
        match message.role {
            Role::User => WireMessage::user(message.content),
            Role::Assistant => WireMessage::assistant(message.content),
        }
    }
}

async fn index_handler(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let has_session = state.session.lock().await.is_some();
    state.render(
        "landing.html",
        minijinja::context! {
            title => PAGE_TITLE,
            has_session => has_session,
        },
    )
}

async fn chat_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let turns = match state.session.lock().await.as_ref() {
        Some(session) => session.conversation().turns().to_vec(),
        None => return Ok(Redirect::to("/").into_response()),
    };
    let page = state.render(
        "chat.html",
        minijinja::context! {
            title => PAGE_TITLE,
            turns => turns,
        },
    )?;
    Ok(page.into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    #[serde(default)]
    api_key: String,
}

async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    if body.api_key.trim().is_empty() {
        return Err(ApiError::BadRequest("API key is required".to_string()));
    }

    // A rejected key leaves any existing session and stored key alone.
    let credential = state
        .gate
        .authorize(&body.api_key)
        .await
        .map_err(|_| ApiError::Unauthorized(INVALID_KEY_MESSAGE.to_string()))?;

    let session = Session::establish(&state.store, credential).map_err(|e| {
        error!("Failed to store API key: {:?}", e);
        ApiError::Internal("API 키 검증 중 오류가 발생했습니다.".to_string())
    })?;
    *state.session.lock().await = Some(session);

    info!("Session established");
    Ok(Json(json!({ "redirect": "/chat" })))
}

async fn logout_handler(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let ended = state.session.lock().await.take();
    let result = match ended {
        Some(session) => session.end(&state.store),
        None => state.store.clear(),
    };
    result.map_err(|e| {
        error!("Failed to clear stored API key: {:?}", e);
        ApiError::Internal(SERVER_ERROR_MESSAGE.to_string())
    })?;
    Ok(Json(json!({ "redirect": "/" })))
}

async fn list_messages_handler(State(state): State<AppState>) -> Result<Json<Vec<ChatTurn>>, ApiError> {
    let guard = state.session.lock().await;
    let session = guard
        .as_ref()
        .ok_or_else(|| ApiError::Unauthorized(LOGIN_REQUIRED_MESSAGE.to_string()))?;
    Ok(Json(session.conversation().turns().to_vec()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest {
    #[serde(default)]
    content: String,
    #[serde(default)]
    search_mode: bool,
}

async fn send_message_handler(
    State(state): State<AppState>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<ChatTurn>, ApiError> {
    let content = body.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Message content is required".to_string()));
    }

    // Snapshot, then release the lock while the provider calls run.
    let (credential, history) = {
        let guard = state.session.lock().await;
        let session = guard
            .as_ref()
            .ok_or_else(|| ApiError::Unauthorized(LOGIN_REQUIRED_MESSAGE.to_string()))?;
        (
            session.credential().clone(),
            session.conversation().turns().to_vec(),
        )
    };

    let mode = ChatMode::from_search_flag(body.search_mode);
    let reply = state
        .orchestrator
        .converse(&history, &content, &credential, mode)
        .await;

    let mut guard = state.session.lock().await;
    match guard.as_mut() {
        Some(session) if session.credential() == &credential => {
            let turn = session.conversation_mut().record_exchange(&content, reply);
            Ok(Json(turn.clone()))
        }
        _ => {
            warn!("Session ended while a message was in flight, dropping the reply");
            Err(ApiError::Unauthorized(LOGIN_REQUIRED_MESSAGE.to_string()))
        }
    }
}

/// Kept for callers of the old server-side chat route: always refuses and
/// points them at the session chat route.
async fn chat_stub_handler() -> impl IntoResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": CLIENT_PATH_NOTICE,
            "redirectToClient": true,
        })),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchRouteRequest {
    messages: Option<Vec<InboundMessage>>,
    api_key: Option<String>,
}

async fn search_handler(
    State(state): State<AppState>,
    Json(body): Json<SearchRouteRequest>,
) -> Result<Json<Value>, ApiError> {
    let (Some(messages), Some(api_key)) = (body.messages, non_empty(body.api_key)) else {
        return Err(ApiError::BadRequest("Messages and API key are required".to_string()));
    };
    if messages.is_empty() {
        return Err(ApiError::BadRequest("Messages must be a non-empty array".to_string()));
    }
    let credential = state.credential_for(&api_key).await?;

    let conversation = messages.into_iter().map(WireMessage::from).collect();
    let response = state
        .orchestrator
        .try_search_answer(conversation, &credential)
        .await
        .map_err(|e| ApiError::relay(e, SERVER_ERROR_MESSAGE))?;
    Ok(Json(json!({ "response": response })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageRouteRequest {
    prompt: Option<String>,
    api_key: Option<String>,
    #[serde(default)]
    conversation_history: Vec<InboundMessage>,
}

async fn image_handler(
    State(state): State<AppState>,
    Json(body): Json<ImageRouteRequest>,
) -> Result<Json<Value>, ApiError> {
    let (Some(prompt), Some(api_key)) = (non_empty(body.prompt), non_empty(body.api_key)) else {
        return Err(ApiError::BadRequest("Prompt and API key are required".to_string()));
    };
    let credential = state.credential_for(&api_key).await?;

    let history: Vec<WireMessage> = body
        .conversation_history
        .into_iter()
        .map(WireMessage::from)
        .collect();
    let image_url = state
        .orchestrator
        .images()
        .generate(&credential, &prompt, &context_lines(&history))
        .await
        .map_err(|e| match e {
            ChatError::ToolInvocation { .. } => {
                error!(error = %e, "Image generation returned no image");
                ApiError::Internal(IMAGE_FAILURE_MESSAGE.to_string())
            }
            other => ApiError::relay(other, SERVER_ERROR_MESSAGE),
        })?;

    Ok(Json(json!({
        "imageUrl": image_url,
        "prompt": prompt,
        "timestamp": Utc::now(),
    })))
}

/// Builds the application router: the two pages, the JSON API, static files.
pub fn router(state: AppState) -> Router {
    let static_files_service = ServeDir::new(&state.static_dir);

    Router::new()
        .route("/", get(index_handler))
        .route("/chat", get(chat_handler))
        .route("/api/session", post(login_handler).delete(logout_handler))
        .route(
            "/api/messages",
            get(list_messages_handler).post(send_message_handler),
        )
        .route("/api/chat", post(chat_stub_handler))
        .route("/api/search", post(search_handler))
        .route("/api/image", post(image_handler))
        .nest_service("/static", static_files_service)
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

pub async fn start_web_server(settings: Settings, addr: SocketAddr) -> Result<()> {
    let state = AppState::new(&settings)?;
    let app = router(state);

    info!("Web server listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}
