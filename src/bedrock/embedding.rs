use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use super::ModelInvoker;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbeddingConfig {
    output_embedding_length: usize,
}

/// Titan 多模态向量嵌入请求体
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbeddingRequest<'a> {
    input_image: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_text: Option<&'a str>,
    embedding_config: EmbeddingConfig,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Option<Vec<f32>>,
}

/// 图片向量嵌入客户端
pub struct EmbeddingClient {
    invoker: Arc<dyn ModelInvoker>,
    model_id: String,
    output_length: usize,
}

impl EmbeddingClient {
    pub fn new(invoker: Arc<dyn ModelInvoker>, model_id: String, output_length: usize) -> Self {
        Self { invoker, model_id, output_length }
    }

    /// 计算 base64 图片的向量
    pub async fn embed(&self, image_base64: &str) -> Result<Vec<f32>> {
        self.embed_with_text(image_base64, None).await
    }

    /// 计算图片和可选描述文本的联合向量
    pub async fn embed_with_text(
        &self,
        image_base64: &str,
        text: Option<&str>,
    ) -> Result<Vec<f32>> {
        let body = serde_json::to_vec(&EmbeddingRequest {
            input_image: image_base64,
            input_text: text,
            embedding_config: EmbeddingConfig { output_embedding_length: self.output_length },
        })?;

        let response = self.invoker.invoke_model(&self.model_id, body).await?;
        let response: EmbeddingResponse =
            serde_json::from_slice(&response).context("无法解析向量嵌入响应")?;

        let Some(embedding) = response.embedding else {
            bail!("向量嵌入响应中缺少 embedding 字段");
        };
        if embedding.len() != self.output_length {
            bail!("向量维度错误: 期望 {}, 实际 {}", self.output_length, embedding.len());
        }
        Ok(embedding)
    }
}
