use axum::{Form, Json, extract::State};
use axum_extra::extract::WithRejection;
use tracing::debug;

use handraise_types::api::{MessageForm, StatusResponse};
use handraise_types::models::ChatMessage;

use crate::error::ApiError;
use crate::state::AppState;

/// POST /post — append a message to the sender's channel. Sender name and
/// broadcaster flag come from the stored user record, not the form.
pub async fn post_message(
    State(state): State<AppState>,
    WithRejection(Form(form), _): WithRejection<Form<MessageForm>, ApiError>,
) -> Result<Json<StatusResponse>, ApiError> {
    let user = state
        .db
        .get_user(&form.uid)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Unknown user {}", form.uid)))?;

    let message = ChatMessage {
        uid: form.uid,
        name: user.name,
        broadcaster: user.broadcaster,
        message: form.message,
    };
    let key = state.db.push_message(&user.channel, &message).await?;

    debug!("Message {} from {} added to {}", key, message.uid, user.channel);
    Ok(Json(StatusResponse::ok("Message added")))
}
