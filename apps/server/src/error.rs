use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use nodewatch_engine::RefreshError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Refresh(#[from] RefreshError),
    #[error("{0}")]
    NotFound(String),
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Refresh(e) => match e {
                RefreshError::Canceled(_) => StatusCode::SERVICE_UNAVAILABLE,
                RefreshError::CredentialMissing(_) | RefreshError::ConfigInvalid(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                // The upstream provider failed us
                _ => StatusCode::BAD_GATEWAY,
            },
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        let body = Json(ErrorBody {
            code: status.as_u16(),
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
