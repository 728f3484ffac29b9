use axum::{Form, Json, extract::State};
use axum_extra::extract::WithRejection;
use tracing::info;

use handraise_db::DbPath;
use handraise_types::api::{RegisterForm, StatusResponse};
use handraise_types::models::UserRecord;

use crate::error::ApiError;
use crate::state::AppState;

/// POST /auth — store `users/{uid}` with the submitted name, broadcaster flag and channel.
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Form(form), _): WithRejection<Form<RegisterForm>, ApiError>,
) -> Result<Json<StatusResponse>, ApiError> {
    // The channel becomes a database location when the user posts.
    DbPath::parse_location(&form.channel)?;

    let user = UserRecord {
        name: form.name,
        broadcaster: form.broadcaster,
        channel: form.channel,
    };
    state.db.put_user(&form.uid, &user).await?;

    info!("Registered {} ({}) on channel {}", user.name, form.uid, user.channel);
    Ok(Json(StatusResponse::ok(format!("Added {} to Database", user.name))))
}
