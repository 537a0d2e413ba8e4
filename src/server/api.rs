use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use log::{debug, info};

use super::error::AppError;
use super::state::AppState;
use super::types::*;
use crate::metrics;

/// 搜索与上传图片相似的参考图片，并生成对比描述
#[utoipa::path(
    post,
    path = "/api/search",
    request_body = SearchRequest,
    responses(
        (status = 200, body = SearchResponse),
        (status = 400, description = "未上传图片或图片格式错误", body = String, content_type = "text/plain"),
        (status = 500, description = "外部服务调用失败", body = String, content_type = "text/plain"),
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let img = match payload {
        Ok(Json(request)) => request.img,
        Err(rejection) => {
            debug!("无法解析请求体: {rejection}");
            None
        }
    };

    info!("正在搜索上传图片");

    match state.searcher.search_data_url(img.as_deref()).await {
        Ok(outcome) => {
            metrics::inc_request_count("ok");
            Ok(Json(SearchResponse {
                description: outcome.description,
                images: outcome.candidates.into_iter().map(|c| c.image).collect(),
            }))
        }
        Err(e) => {
            metrics::inc_request_count(e.kind());
            Err(e.into())
        }
    }
}
