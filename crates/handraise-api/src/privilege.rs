use axum::{Form, Json, extract::State};
use axum_extra::extract::WithRejection;
use tracing::info;

use handraise_types::api::{StatusResponse, UidForm};

use crate::error::ApiError;
use crate::state::AppState;

/// POST /add — raise a hand: a pending privilege record for `uid`.
pub async fn raise_hand(
    State(state): State<AppState>,
    WithRejection(Form(form), _): WithRejection<Form<UidForm>, ApiError>,
) -> Result<Json<StatusResponse>, ApiError> {
    state.db.request_privilege(&form.uid).await?;

    info!("{} requested privilege", form.uid);
    Ok(Json(StatusResponse::ok("Requested Privilege")))
}

/// POST /accept — grant a pending request. Granting twice is a conflict.
pub async fn accept_request(
    State(state): State<AppState>,
    WithRejection(Form(form), _): WithRejection<Form<UidForm>, ApiError>,
) -> Result<Json<StatusResponse>, ApiError> {
    let record = state
        .db
        .get_privilege(&form.uid)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No pending request for {}", form.uid)))?;

    if record.is_accepted() {
        return Err(ApiError::Conflict("User already privileged".to_string()));
    }

    state.db.grant_privilege(&form.uid).await?;

    info!("{} is now privileged", form.uid);
    Ok(Json(StatusResponse::ok(format!("{} is now privileged", form.uid))))
}

/// POST /delete — drop `uid` from the privilege list, pending or granted.
pub async fn remove_from_list(
    State(state): State<AppState>,
    WithRejection(Form(form), _): WithRejection<Form<UidForm>, ApiError>,
) -> Result<Json<StatusResponse>, ApiError> {
    state.db.remove_privilege(&form.uid).await?;

    info!("{} removed from privilege list", form.uid);
    Ok(Json(StatusResponse::ok(format!("{} removed", form.uid))))
}
