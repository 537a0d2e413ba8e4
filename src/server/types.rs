use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 搜索请求
#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchRequest {
    /// data URL 格式的图片，例如 `data:image/jpeg;base64,...`
    #[serde(default)]
    pub img: Option<String>,
}

/// 搜索响应
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    /// 上传图片与相似图片的对比描述
    pub description: String,
    /// 最相似的图片（base64），越相似越靠前，至多 3 张
    pub images: Vec<String>,
}
