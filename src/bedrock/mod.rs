//! AWS Bedrock 模型调用

mod description;
mod embedding;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use aws_sdk_bedrockruntime::Client;
use aws_sdk_bedrockruntime::config::{Credentials, Region};
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::primitives::Blob;
use log::info;

pub use self::description::*;
pub use self::embedding::*;
use crate::config::BedrockOptions;

/// 以 JSON 请求体调用一个模型，返回原始响应体
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke_model(&self, model_id: &str, body: Vec<u8>) -> Result<Vec<u8>>;
}

/// 基于 Bedrock Runtime 的模型调用
pub struct BedrockInvoker {
    client: Client,
}

impl BedrockInvoker {
    /// 创建客户端
    ///
    /// 同时提供 access key 和 secret key 时使用静态凭证，否则使用 AWS 默认凭证链。
    pub async fn connect(opts: &BedrockOptions) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(opts.region.clone()));
        if let (Some(key), Some(secret)) = (&opts.aws_access_key, &opts.aws_secret_key) {
            info!("使用静态 AWS 凭证");
            loader = loader.credentials_provider(Credentials::new(
                key.clone(),
                secret.clone(),
                None,
                None,
                "lookalike",
            ));
        }
        let config = loader.load().await;
        Self { client: Client::new(&config) }
    }
}

#[async_trait]
impl ModelInvoker for BedrockInvoker {
    async fn invoke_model(&self, model_id: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        let output = self
            .client
            .invoke_model()
            .model_id(model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| anyhow!("调用模型 {model_id} 失败: {}", DisplayErrorContext(&e)))?;
        Ok(output.body.into_inner())
    }
}
