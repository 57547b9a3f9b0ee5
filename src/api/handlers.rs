//! HTTP request handlers

use super::sse::outbox_stream;
use super::types::{CancelResponse, DeepLinkResponse, DispatchResponse, ErrorResponse};
use super::AppState;
use crate::db::{ConversantId, NewStudent};
use crate::runtime::DispatchError;
use crate::state_machine::InboundMessage;
use crate::token::{Opcode, TokenError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Chat transport side
        .route("/api/messages", post(post_message))
        .route("/api/outbox/stream", get(stream_outbox))
        .route("/api/sessions/:id/cancel", post(cancel_session))
        // Web login side
        .route("/api/deeplinks", post(create_deep_link))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Chat Transport
// ============================================================

async fn post_message(
    State(state): State<AppState>,
    Json(msg): Json<InboundMessage>,
) -> Result<Json<DispatchResponse>, AppError> {
    tracing::debug!(
        conversant_id = msg.sender.id,
        chat_id = msg.chat_id,
        private = msg.is_private,
        "Inbound message"
    );
    let dispatched = state.dispatcher.dispatch(&msg).await?;
    Ok(Json(DispatchResponse {
        status: dispatched.status,
        delivered: dispatched.delivered,
    }))
}

async fn stream_outbox(State(state): State<AppState>) -> impl IntoResponse {
    tracing::info!("Outbox reader connected");
    outbox_stream(state.outbox_tx.subscribe())
}

async fn cancel_session(
    State(state): State<AppState>,
    Path(conversant): Path<ConversantId>,
) -> Json<CancelResponse> {
    let cancelled = state.dispatcher.cancel(conversant).await;
    Json(CancelResponse { cancelled })
}

// ============================================================
// Deep Links
// ============================================================

async fn create_deep_link(
    State(state): State<AppState>,
    Json(student): Json<NewStudent>,
) -> Result<Json<DeepLinkResponse>, AppError> {
    validate_student(&student)?;

    // Mint first so an unusable prefix never reaches the database
    let dialog = state.dispatcher.dialog();
    let token = dialog
        .codec
        .encode(Opcode::Register.as_char(), &student.email_prefix)
        .map_err(|e| match e {
            TokenError::TooLong(_) => AppError::BadRequest(e.to_string()),
            _ => AppError::Internal(e.to_string()),
        })?;

    let student = state
        .db
        .upsert_student(&student)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let url = dialog.config.deep_link(&token);

    tracing::info!(student_id = student.id, "Deep link minted");
    Ok(Json(DeepLinkResponse {
        token,
        url,
        student,
    }))
}

fn validate_student(student: &NewStudent) -> Result<(), AppError> {
    let prefix = &student.email_prefix;
    if prefix.is_empty() || prefix.contains('@') || prefix.chars().any(char::is_whitespace) {
        return Err(AppError::BadRequest(format!(
            "Invalid e-mail prefix: {prefix:?}"
        )));
    }
    if student.first_name.trim().is_empty() || student.last_name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "First and last name are required".to_string(),
        ));
    }
    Ok(())
}

async fn get_version() -> &'static str {
    concat!("thorunimore ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Unavailable(String),
    Internal(String),
}

impl From<DispatchError> for AppError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Transport(e) => AppError::Unavailable(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
