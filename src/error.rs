use std::fmt;

use thiserror::Error;

/// 搜索流水线的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Normalize,
    Embed,
    Search,
    Describe,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normalize => "normalize",
            Self::Embed => "embed",
            Self::Search => "search",
            Self::Describe => "describe",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 搜索流水线错误
#[derive(Debug, Error)]
pub enum SearchError {
    /// 请求中没有图片
    #[error("request carries no image")]
    MissingImage,
    /// 图片负载为空或不是合法的 base64
    #[error("image payload is not valid base64")]
    InvalidBase64,
    /// 无法解码为图片
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    /// 外部服务（向量嵌入、向量搜索、文本生成）调用失败
    #[error("{stage} call failed: {source:#}")]
    Upstream {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
    /// 服务内部错误
    #[error("internal error: {0:#}")]
    Internal(#[source] anyhow::Error),
}

impl SearchError {
    pub fn upstream(stage: Stage, source: impl Into<anyhow::Error>) -> Self {
        Self::Upstream { stage, source: source.into() }
    }

    /// 是否为用户输入导致的错误
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MissingImage | Self::InvalidBase64 | Self::Decode(_))
    }

    /// 用于指标标签的错误类别
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingImage | Self::InvalidBase64 => "validation",
            Self::Decode(_) => "decode",
            Self::Upstream { .. } => "upstream",
            Self::Internal(_) => "internal",
        }
    }
}

pub type Result<T, E = SearchError> = std::result::Result<T, E>;
