use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;

use coffeechat_db::models::MessageRow;
use coffeechat_types::api::{
    ConversationList, ConversationResponse, Envelope, LastMessage, MessageResponse, PageQuery,
    SendMessageRequest, ThreadResponse,
};
use coffeechat_types::models::{PageRequest, Pagination};

use crate::auth::{AppState, Principal};
use crate::error::ApiError;
use crate::{run_db, to_utc};

const THREAD_DEFAULT_LIMIT: u32 = 50;
const THREAD_MAX_LIMIT: u32 = 100;

fn message_response(row: MessageRow) -> MessageResponse {
    MessageResponse {
        created_at: to_utc(&row.created_at, "message", &row.id.to_string()),
        id: row.id,
        sender_id: row.sender_id,
        recipient_id: row.recipient_id,
        content: row.content,
        sender: row.sender,
    }
}

/// POST /api/messages
pub async fn send_message(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    WithRejection(Json(req), _): WithRejection<Json<SendMessageRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let sender_id = principal.user_id;
    let row = run_db(&state, move |db| {
        db.send_message(&sender_id, &req.recipient_id, &req.content)
    })
    .await?;

    info!("Message {} sent from {} to {}", row.id, row.sender_id, row.recipient_id);

    Ok((
        StatusCode::CREATED,
        Json(Envelope::new("Message sent successfully", message_response(row))),
    ))
}

/// GET /api/messages/conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = principal.user_id;
    let rows = run_db(&state, move |db| db.list_conversations(&user_id)).await?;

    let conversations = rows
        .into_iter()
        .map(|row| {
            let last = row.last_message;
            ConversationResponse {
                partner_id: row.partner.id,
                partner_name: row.partner.name,
                partner_profile_picture: row.partner.image,
                last_message: LastMessage {
                    created_at: to_utc(&last.created_at, "message", &last.id.to_string()),
                    content: last.content,
                    sender_id: last.sender_id,
                },
            }
        })
        .collect();

    Ok(Json(Envelope::new(
        "Conversations retrieved successfully",
        ConversationList { conversations },
    )))
}

/// GET /api/messages/conversations/{user_id}
pub async fn get_thread(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(partner_id): Path<String>,
    WithRejection(Query(query), _): WithRejection<Query<PageQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let page = PageRequest::clamped(query.page, query.limit, THREAD_DEFAULT_LIMIT, THREAD_MAX_LIMIT);
    let user_id = principal.user_id;
    let thread = run_db(&state, move |db| db.get_thread(&user_id, &partner_id, page)).await?;

    Ok(Json(Envelope::new(
        "Conversation messages retrieved successfully",
        ThreadResponse {
            messages: thread.messages.into_iter().map(message_response).collect(),
            other_user: thread.other_user,
            pagination: Pagination::new(page, thread.total),
        },
    )))
}
