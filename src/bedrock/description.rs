use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::ModelInvoker;

pub const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
pub const SYSTEM_PROMPT: &str = "Please act as face comparison analyzer.";
pub const COMPARE_PROMPT: &str = "Please let the user know how their first image is similar to the other 3 and which one is the most similar?";
/// 模型没有返回文本时使用的描述
pub const FALLBACK_DESCRIPTION: &str = "No description available";

#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    r#type: &'static str,
    media_type: &'static str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock<'a> {
    Image { source: ImageSource<'a> },
    Text { text: &'a str },
}

impl<'a> ContentBlock<'a> {
    fn jpeg(data: &'a str) -> Self {
        Self::Image { source: ImageSource { r#type: "base64", media_type: "image/jpeg", data } }
    }
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<ContentBlock<'a>>,
}

/// Anthropic messages API 请求体
#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    anthropic_version: &'static str,
    max_tokens: u32,
    system: &'static str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

/// 多图对比描述客户端
pub struct DescriptionClient {
    invoker: Arc<dyn ModelInvoker>,
    model_id: String,
    max_tokens: u32,
}

impl DescriptionClient {
    pub fn new(invoker: Arc<dyn ModelInvoker>, model_id: String, max_tokens: u32) -> Self {
        Self { invoker, model_id, max_tokens }
    }

    /// 描述查询图片与候选图片的相似之处
    ///
    /// 请求中依次放入查询图片、按排名排列的候选图片和固定提示词，返回第一个内容块的文本。
    pub async fn describe(&self, query_image: &str, candidates: &[String]) -> Result<String> {
        let mut content = Vec::with_capacity(candidates.len() + 2);
        content.push(ContentBlock::jpeg(query_image));
        content.extend(candidates.iter().map(|data| ContentBlock::jpeg(data)));
        content.push(ContentBlock::Text { text: COMPARE_PROMPT });

        let body = serde_json::to_vec(&MessagesRequest {
            anthropic_version: ANTHROPIC_VERSION,
            max_tokens: self.max_tokens,
            system: SYSTEM_PROMPT,
            messages: vec![Message { role: "user", content }],
        })?;

        let response = self.invoker.invoke_model(&self.model_id, body).await?;
        let response: MessagesResponse =
            serde_json::from_slice(&response).context("无法解析文本生成响应")?;

        Ok(response
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| FALLBACK_DESCRIPTION.to_string()))
    }
}
