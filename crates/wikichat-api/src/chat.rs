use std::sync::Arc;

use axum::{
    Form, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, error, info, warn};

use wikichat_log::{ChatLog, LogError};
use wikichat_types::api::{ChatForm, ChatOutcome, ChatView};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub chat_log: ChatLog,
    /// Author used when the name field is blank.
    pub anonymous_name: String,
}

/// Current chat entries, most popular first.
pub async fn get_chat(State(state): State<AppState>) -> impl IntoResponse {
    let entries = state.chat_log.ranked().await;
    Json(ChatView {
        outcome: ChatOutcome::None,
        entry: None,
        entries,
    })
}

/// Post a message or vote on one, then render the ranked view.
///
/// A non-empty `chat` field posts; otherwise a non-empty `count` votes on the
/// entry with that id. Voting on an unknown id leaves everything unchanged.
pub async fn post_chat(
    State(state): State<AppState>,
    Form(form): Form<ChatForm>,
) -> Result<impl IntoResponse, StatusCode> {
    let chat = form.chat.unwrap_or_default();
    let count = form.count.unwrap_or_default();

    let (status, outcome, entry) = if !chat.trim().is_empty() {
        let name = form
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| state.anonymous_name.clone());

        let entry = state
            .chat_log
            .post(&name, &chat)
            .await
            .map_err(status_for)?;
        info!("{} posted chat entry {}", entry.author, entry.id);
        (StatusCode::CREATED, ChatOutcome::Posted, Some(entry))
    } else if !count.trim().is_empty() {
        let id: u64 = count.trim().parse().map_err(|_| {
            warn!("Vote with non-numeric id {:?}", count);
            StatusCode::BAD_REQUEST
        })?;

        match state.chat_log.vote(id).await {
            Ok(entry) => {
                debug!("Chat entry {} now has {} nice", entry.id, entry.nice_count);
                (StatusCode::OK, ChatOutcome::Voted, Some(entry))
            }
            Err(LogError::NotFound(_)) => {
                debug!("Vote for unknown chat entry {}", id);
                (StatusCode::OK, ChatOutcome::NotFound, None)
            }
            Err(e) => return Err(status_for(e)),
        }
    } else {
        (StatusCode::OK, ChatOutcome::None, None)
    };

    let entries = state.chat_log.ranked().await;
    Ok((status, Json(ChatView { outcome, entry, entries })))
}

fn status_for(err: LogError) -> StatusCode {
    match err {
        LogError::InvalidRecord(e) => {
            warn!("Rejected chat input: {}", e);
            StatusCode::BAD_REQUEST
        }
        e @ LogError::CountOverflow(_) => {
            warn!("Rejected vote: {}", e);
            StatusCode::CONFLICT
        }
        e => {
            error!("Chat log write failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
