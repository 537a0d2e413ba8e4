use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::{error, warn};

use crate::error::SearchError;

pub const MISSING_IMAGE: &str = "Please upload an image first.";
pub const INVALID_IMAGE: &str = "Invalid image format.";
pub const INTERNAL_ERROR: &str = "Internal Server Error";

/// API错误类型
pub struct AppError(pub SearchError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            SearchError::MissingImage => (StatusCode::BAD_REQUEST, MISSING_IMAGE),
            SearchError::InvalidBase64 | SearchError::Decode(_) => {
                (StatusCode::BAD_REQUEST, INVALID_IMAGE)
            }
            SearchError::Upstream { .. } | SearchError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
            }
        };
        if status.is_server_error() {
            error!("搜索失败: {}", self.0);
        } else {
            warn!("请求无效: {}", self.0);
        }
        (status, body).into_response()
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        Self(err)
    }
}
