//! API routes

use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::conversation::{Chatroom, Message, NewMessage};
use crate::core::{ChatError, OtpChallenge, User};
use crate::countries::Country;
use crate::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Error body returned by every route
#[derive(Debug)]
pub enum ApiError {
    Chat(ChatError),
    Unauthorized,
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        ApiError::Chat(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Not signed in".to_string()),
            ApiError::Chat(err) => {
                let status = match err {
                    ChatError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                    ChatError::InvalidOtp => StatusCode::UNAUTHORIZED,
                    ChatError::RoomNotFound(_) => StatusCode::NOT_FOUND,
                };
                (status, err.to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpRequest {
    pub phone: String,
    pub country_code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub phone: String,
    pub country_code: String,
    pub otp: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub user: Option<User>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateChatroom {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub page_size: Option<usize>,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn request_otp(
    State(state): State<AppState>,
    Json(request): Json<OtpRequest>,
) -> ApiResult<Json<OtpChallenge>> {
    let challenge = state
        .sessions
        .request_otp(&request.phone, &request.country_code)?;
    Ok(Json(challenge))
}

async fn verify_otp(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> ApiResult<Json<User>> {
    let user = state
        .sessions
        .verify(&request.phone, &request.country_code, &request.otp)
        .await?;
    Ok(Json(user))
}

async fn current_session(State(state): State<AppState>) -> Json<SessionResponse> {
    let user = state.sessions.current().await;
    Json(SessionResponse {
        authenticated: user.is_some(),
        user,
    })
}

async fn logout(State(state): State<AppState>) -> StatusCode {
    state.sessions.logout().await;
    state.orchestrator.reset_all();
    StatusCode::NO_CONTENT
}

async fn require_session(state: &AppState) -> ApiResult<User> {
    state.sessions.current().await.ok_or(ApiError::Unauthorized)
}

async fn require_room(state: &AppState, id: &str) -> ApiResult<Chatroom> {
    state
        .chatrooms
        .get(id)
        .await
        .ok_or_else(|| ChatError::RoomNotFound(id.to_string()).into())
}

async fn list_chatrooms(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<Chatroom>>> {
    require_session(&state).await?;

    let rooms = match query.q {
        Some(q) => state.chatrooms.find_by_title(&q, true).await,
        None => state.chatrooms.list().await,
    };
    Ok(Json(rooms))
}

async fn create_chatroom(
    State(state): State<AppState>,
    Json(request): Json<CreateChatroom>,
) -> ApiResult<(StatusCode, Json<Chatroom>)> {
    require_session(&state).await?;

    let room = state.chatrooms.create(&request.title).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

async fn delete_chatroom(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    require_session(&state).await?;

    state.chatrooms.delete(&id).await;
    // pending replies first, so none lands after the clear
    state.orchestrator.reset_room(&id);
    state.messages.clear_by_room(&id).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    require_session(&state).await?;
    require_room(&state, &id).await?;

    let Some(page) = query.page else {
        return Ok(Json(state.messages.by_room(&id).await));
    };

    let delay = state.config.chat.page_delay_ms;
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let page_size = query.page_size.unwrap_or(state.config.chat.page_size);
    Ok(Json(state.messages.by_room_paged(&id, page, page_size).await))
}

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<NewMessage>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    require_session(&state).await?;
    require_room(&state, &id).await?;

    // The reply keeps running after the response is sent
    let turn = state.orchestrator.send(&id, input).await?;
    Ok((StatusCode::ACCEPTED, Json(turn.user_message)))
}

async fn countries(State(state): State<AppState>) -> Json<Vec<Country>> {
    Json(state.countries.list().await)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/session", get(current_session).delete(logout))
        .route("/v1/session/otp", post(request_otp))
        .route("/v1/session/verify", post(verify_otp))
        .route("/v1/chatrooms", get(list_chatrooms).post(create_chatroom))
        .route("/v1/chatrooms/:id", delete(delete_chatroom))
        .route(
            "/v1/chatrooms/:id/messages",
            get(list_messages).post(send_message),
        )
        .route("/v1/countries", get(countries))
}
