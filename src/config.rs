use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::cli::*;
use crate::normalize::NormalizeOptions;

/// 解析 `1/true/on/yes` 形式的开关，忽略大小写和首尾空白
pub fn parse_flag(s: &str) -> Result<bool, String> {
    Ok(matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "on" | "yes"))
}

#[derive(Args, Debug, Clone)]
pub struct StoreOptions {
    /// MongoDB 连接字符串
    #[arg(long, env = "MONGODB_URI", hide_env_values = true)]
    pub mongodb_uri: String,
    /// 数据库名，不填则使用连接字符串中的数据库
    #[arg(long, env = "MONGODB_DATABASE")]
    pub database: Option<String>,
    /// 参考图片所在集合
    #[arg(long, default_value = "celeb_images")]
    pub collection: String,
    /// 向量搜索索引名
    #[arg(long, default_value = "vector_index")]
    pub vector_index: String,
    /// 文档中存放向量的字段
    #[arg(long, default_value = "embeddings")]
    pub embedding_path: String,
    /// 文档中存放 base64 图片的字段
    #[arg(long, default_value = "image")]
    pub image_field: String,
}

#[derive(Args, Debug, Clone)]
pub struct BedrockOptions {
    /// AWS access key，不填则使用默认凭证链
    #[arg(long, env = "AWS_ACCESS_KEY", hide_env_values = true)]
    pub aws_access_key: Option<String>,
    /// AWS secret key
    #[arg(long, env = "AWS_SECRET_KEY", hide_env_values = true)]
    pub aws_secret_key: Option<String>,
    /// Bedrock 所在区域
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub region: String,
    /// 向量嵌入模型
    #[arg(long, default_value = "amazon.titan-embed-image-v1")]
    pub embedding_model: String,
    /// 对比描述模型
    #[arg(long, default_value = "anthropic.claude-3-sonnet-20240229-v1:0")]
    pub description_model: String,
}

#[derive(Args, Debug, Clone)]
pub struct PipelineOptions {
    /// 向量维度
    #[arg(long, value_name = "N", default_value_t = 1024)]
    pub embedding_length: usize,
    /// 近似最近邻搜索的候选池大小，不能小于 `--limit`
    #[arg(long, value_name = "N", default_value_t = 15, value_parser = clap::value_parser!(u32).range(1..=10000))]
    pub num_candidates: u32,
    /// 返回的相似图片数量
    #[arg(long, value_name = "N", default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub limit: u32,
    /// 描述生成的最大 token 数
    #[arg(long, value_name = "N", default_value_t = 1000)]
    pub max_tokens: u32,
    /// 每次外部调用的超时时间，单位为秒
    #[arg(long, value_name = "SECS", default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub call_timeout: u64,
    /// 归一化后的图片尺寸
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size, default_value = "800x600")]
    pub image_size: (u32, u32),
    /// 归一化后的 JPEG 质量
    #[arg(long, value_name = "Q", default_value_t = 85, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: u8,
}

impl PipelineOptions {
    /// 检查选项之间的约束
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.num_candidates < self.limit {
            anyhow::bail!(
                "--num-candidates ({}) 不能小于 --limit ({})",
                self.num_candidates,
                self.limit
            );
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout)
    }

    pub fn normalize(&self) -> NormalizeOptions {
        NormalizeOptions {
            width: self.image_size.0,
            height: self.image_size.1,
            quality: self.jpeg_quality,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "lookalike", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// 输出调试日志
    #[arg(
        long,
        global = true,
        env = "DEBUG",
        action = clap::ArgAction::Set,
        value_parser = parse_flag,
        default_value = "false",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub debug: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 启动 HTTP 搜索服务
    Server(ServerCommand),
    /// 对本地图片执行一次搜索
    Search(SearchCommand),
}

fn parse_size(s: &str) -> anyhow::Result<(u32, u32)> {
    let parts: Vec<&str> = s.split('x').collect();
    if parts.len() != 2 {
        return Err(anyhow::anyhow!("无效的尺寸: {}", s));
    }
    let (width, height): (u32, u32) = (parts[0].parse()?, parts[1].parse()?);
    if width == 0 || height == 0 {
        return Err(anyhow::anyhow!("尺寸不能为 0: {}", s));
    }
    Ok((width, height))
}
