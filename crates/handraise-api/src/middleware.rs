use axum::{
    Json,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::{debug, warn};

use handraise_types::api::{Claims, StatusResponse};

use crate::error::{ApiError, Traceback};
use crate::state::AppState;

/// Validate the bearer JWT on write routes. Only installed when a secret is configured.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(secret) = state.jwt_secret.as_deref() else {
        return Ok(next.run(req).await);
    };

    let TypedHeader(Authorization(bearer)) = bearer.map_err(|_| ApiError::Unauthorized)?;

    let token_data = decode::<Claims>(
        bearer.token(),
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        warn!("Rejected bearer token: {}", e);
        ApiError::Unauthorized
    })?;

    debug!("Authenticated request for {}", token_data.claims.sub);
    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

/// Debug mode: re-render internal errors with their cause chain.
pub async fn attach_traceback(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;

    let Some(Traceback(lines)) = response.extensions_mut().remove::<Traceback>() else {
        return response;
    };

    let status = response.status();
    let mut body = StatusResponse::new(
        status.as_u16(),
        status.canonical_reason().unwrap_or("Internal Server Error"),
    );
    body.traceback = Some(lines);

    (status, Json(body)).into_response()
}
