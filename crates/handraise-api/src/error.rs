use axum::{
    Json,
    extract::rejection::FormRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use handraise_db::DbError;
use handraise_types::api::StatusResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body could not be read as the expected form.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal Server Error")]
    Internal(anyhow::Error),
}

/// Cause chain of an internal error, carried on the response so the debug
/// layer can render it.
#[derive(Debug, Clone)]
pub struct Traceback(pub Vec<String>);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Rejected { status, .. } => *status,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        // Missing or undecodable fields are client errors, not 422s.
        let status = match &rejection {
            FormRejection::FailedToDeserializeForm(_)
            | FormRejection::FailedToDeserializeFormBody(_) => StatusCode::BAD_REQUEST,
            other => other.status(),
        };

        ApiError::Rejected {
            status,
            message: rejection.body_text(),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        if matches!(err, DbError::InvalidKey(_)) {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::Internal(err.into())
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<DbError>() {
            Ok(db_err) => db_err.into(),
            Err(err) => ApiError::Internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = StatusResponse::new(status.as_u16(), self.to_string());
        let mut response = (status, Json(body)).into_response();

        if let ApiError::Internal(err) = self {
            error!("Request failed: {:#}", err);
            response
                .extensions_mut()
                .insert(Traceback(err.chain().map(|cause| cause.to_string()).collect()));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_key_is_a_bad_request() {
        let err: ApiError = anyhow::Error::from(DbError::InvalidKey("a/b".into())).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Invalid key: \"a/b\"");
    }

    #[test]
    fn firebase_failure_is_internal() {
        let err: ApiError = anyhow::Error::from(DbError::Firebase {
            status: 401,
            message: "Permission denied".into(),
        })
        .into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn internal_response_carries_cause_chain() {
        let err = anyhow::anyhow!("disk full").context("write failed");
        let response = ApiError::Internal(err).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let Traceback(lines) = response.extensions().get::<Traceback>().unwrap().clone();
        assert_eq!(lines, ["write failed", "disk full"]);
    }

    #[test]
    fn conflict_keeps_message() {
        let response = ApiError::Conflict("User already privileged".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(response.extensions().get::<Traceback>().is_none());
    }
}
