use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::error;

use crate::error::Error;

/// API错误类型
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, error: anyhow::anyhow!(message.into()) }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// 根据库错误的类型决定状态码
fn status_of(err: &anyhow::Error) -> StatusCode {
    match err.downcast_ref::<Error>() {
        Some(Error::SourceNotFound(_)) => StatusCode::NOT_FOUND,
        Some(
            Error::UnknownMetric(_)
            | Error::DimensionMismatch { .. }
            | Error::InvalidTableName(_)
            | Error::DuplicateName(_),
        ) => StatusCode::BAD_REQUEST,
        Some(Error::Upstream { .. } | Error::Http(_) | Error::DescriptionMissing(_)) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("请求处理失败: {:?}", self.error);
        }
        (self.status, format!("Something went wrong: {}", self.error)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let error = err.into();
        Self { status: status_of(&error), error }
    }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
