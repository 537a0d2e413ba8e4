use std::io::Cursor;
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::{GeneralPurpose, GeneralPurposeConfig};
use base64::prelude::BASE64_STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use regex::Regex;

use crate::error::{Result, SearchError};

static BASE64_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9+/]{4})*(?:[A-Za-z0-9+/]{2}==|[A-Za-z0-9+/]{3}=)?$")
        .expect("failed to build regex")
});

/// 标准字母表，接受末尾非零填充位，校验交给 [`is_valid_base64`]
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// 图片归一化参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// 输出宽度
    pub width: u32,
    /// 输出高度
    pub height: u32,
    /// JPEG 质量，1 ~ 100
    pub quality: u8,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self { width: 800, height: 600, quality: 85 }
    }
}

/// 归一化后的图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    /// JPEG 字节
    pub bytes: Vec<u8>,
    /// `bytes` 的 base64 编码
    pub base64: String,
}

impl NormalizedImage {
    fn from_bytes(bytes: Vec<u8>) -> Self {
        let base64 = BASE64_STANDARD.encode(&bytes);
        Self { bytes, base64 }
    }

    /// blake3 摘要的前 8 位十六进制，仅用于日志
    pub fn digest(&self) -> String {
        blake3::hash(&self.bytes).to_hex()[..8].to_string()
    }
}

/// 取出 data URL 中第一个逗号之后的部分，没有逗号时返回整个字符串
pub fn extract_payload(data_url: &str) -> &str {
    match data_url.split_once(',') {
        Some((_, payload)) => payload,
        None => data_url,
    }
}

/// 检查是否为带正确填充的标准 base64 字符串
pub fn is_valid_base64(s: &str) -> bool {
    BASE64_RE.is_match(s)
}

/// 将任意格式的图片缩放到固定尺寸，并重新编码为 JPEG
///
/// 不保持长宽比。相同的输入总是得到相同的输出。
pub fn normalize_bytes(bytes: &[u8], opts: NormalizeOptions) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes).map_err(SearchError::Decode)?;
    let img = img.resize_exact(opts.width, opts.height, FilterType::Triangle).to_rgb8();

    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, opts.quality)
        .encode_image(&img)
        .map_err(|e| SearchError::Internal(e.into()))?;
    Ok(buf.into_inner())
}

/// 校验并归一化上传的 data URL 图片
pub fn normalize_data_url(data_url: &str, opts: NormalizeOptions) -> Result<NormalizedImage> {
    let payload = extract_payload(data_url);
    if payload.is_empty() || !is_valid_base64(payload) {
        return Err(SearchError::InvalidBase64);
    }
    let bytes = LENIENT_BASE64.decode(payload).map_err(|_| SearchError::InvalidBase64)?;
    normalize_bytes(&bytes, opts).map(NormalizedImage::from_bytes)
}

/// 归一化本地图片数据
pub fn normalize_raw(bytes: &[u8], opts: NormalizeOptions) -> Result<NormalizedImage> {
    normalize_bytes(bytes, opts).map(NormalizedImage::from_bytes)
}
