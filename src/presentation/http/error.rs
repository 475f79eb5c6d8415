//! Mapping of pipeline errors onto HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::common::error::MgrError;

/// Error returned by the update endpoint
#[derive(Debug)]
pub enum ApiError {
    /// Credential mismatch; answered with an empty body
    Unauthorized,
    /// Synchronous pipeline failure, reported with its stage label
    Pipeline(MgrError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            ApiError::Pipeline(err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            }
        }
    }
}

impl From<MgrError> for ApiError {
    fn from(err: MgrError) -> Self {
        if err.is_unauthorized() {
            ApiError::Unauthorized
        } else {
            ApiError::Pipeline(err)
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
