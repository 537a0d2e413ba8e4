use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use tokio::task::block_in_place;
use tokio::time::timeout;

use crate::bedrock::{BedrockInvoker, DescriptionClient, EmbeddingClient, ModelInvoker};
use crate::config::{BedrockOptions, PipelineOptions, StoreOptions};
use crate::db::{self, Candidate, MongoVectorStore, VectorStore};
use crate::error::{Result, SearchError, Stage};
use crate::metrics;
use crate::normalize::{self, NormalizedImage, NormalizeOptions};

/// 一次搜索的结果
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// 对比描述
    pub description: String,
    /// 相似图片，越相似越靠前
    pub candidates: Vec<Candidate>,
}

/// 搜索流水线：归一化 → 向量嵌入 → 向量搜索 → 对比描述
///
/// 每个阶段失败都会立即终止，不会返回部分结果。
pub struct Searcher {
    embedding: EmbeddingClient,
    description: DescriptionClient,
    store: Arc<dyn VectorStore>,
    normalize: NormalizeOptions,
    num_candidates: u32,
    limit: u32,
    call_timeout: Duration,
}

impl Searcher {
    pub fn new(
        invoker: Arc<dyn ModelInvoker>,
        store: Arc<dyn VectorStore>,
        bedrock: &BedrockOptions,
        pipeline: &PipelineOptions,
    ) -> Self {
        Self {
            embedding: EmbeddingClient::new(
                invoker.clone(),
                bedrock.embedding_model.clone(),
                pipeline.embedding_length,
            ),
            description: DescriptionClient::new(
                invoker,
                bedrock.description_model.clone(),
                pipeline.max_tokens,
            ),
            store,
            normalize: pipeline.normalize(),
            num_candidates: pipeline.num_candidates,
            limit: pipeline.limit,
            call_timeout: pipeline.call_timeout(),
        }
    }

    /// 连接数据库和 Bedrock，创建搜索流水线
    ///
    /// 数据库不可用时返回错误，调用方不应继续提供服务。
    pub async fn connect(
        store: &StoreOptions,
        bedrock: &BedrockOptions,
        pipeline: &PipelineOptions,
    ) -> anyhow::Result<Self> {
        pipeline.validate()?;
        let db = db::init_db(store, pipeline.call_timeout()).await?;
        let store = Arc::new(MongoVectorStore::new(&db, store));
        let invoker = Arc::new(BedrockInvoker::connect(bedrock).await);
        Ok(Self::new(invoker, store, bedrock, pipeline))
    }

    /// 搜索上传的 data URL 图片
    pub async fn search_data_url(&self, data_url: Option<&str>) -> Result<SearchOutcome> {
        let data_url = match data_url {
            Some(s) if !s.is_empty() => s,
            _ => return Err(SearchError::MissingImage),
        };
        let opts = self.normalize;
        let image = measure(Stage::Normalize, || {
            block_in_place(|| normalize::normalize_data_url(data_url, opts))
        })?;
        self.search_normalized(image, None).await
    }

    /// 搜索本地图片数据，`text` 会和图片一起参与向量嵌入
    pub async fn search_bytes(&self, bytes: &[u8], text: Option<&str>) -> Result<SearchOutcome> {
        let opts = self.normalize;
        let image =
            measure(Stage::Normalize, || block_in_place(|| normalize::normalize_raw(bytes, opts)))?;
        self.search_normalized(image, text).await
    }

    async fn search_normalized(
        &self,
        image: NormalizedImage,
        text: Option<&str>,
    ) -> Result<SearchOutcome> {
        let start = Instant::now();
        let digest = image.digest();
        debug!("[{digest}] 图片归一化完成: {} 字节", image.bytes.len());

        let embedding =
            self.call(Stage::Embed, self.embedding.embed_with_text(&image.base64, text)).await?;
        debug!("[{digest}] 向量嵌入完成: {} 维", embedding.len());

        let candidates = self
            .call(Stage::Search, self.store.nearest(&embedding, self.num_candidates, self.limit))
            .await?;
        metrics::observe_candidate_count(candidates.len());
        debug!("[{digest}] 向量搜索完成: {} 个候选", candidates.len());

        let images: Vec<String> = candidates.iter().map(|c| c.image.clone()).collect();
        let description =
            self.call(Stage::Describe, self.description.describe(&image.base64, &images)).await?;

        info!(
            "[{digest}] 搜索完成: {} 个候选, 耗时 {:.2}s",
            candidates.len(),
            start.elapsed().as_secs_f32()
        );
        Ok(SearchOutcome { description, candidates })
    }

    /// 执行一次带超时的外部调用
    async fn call<T>(
        &self,
        stage: Stage,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T> {
        let start = Instant::now();
        let result = match timeout(self.call_timeout, fut).await {
            Ok(result) => result.map_err(|e| SearchError::upstream(stage, e)),
            Err(_) => Err(SearchError::upstream(
                stage,
                anyhow::anyhow!("超时 ({}s)", self.call_timeout.as_secs_f32()),
            )),
        };
        metrics::observe_stage_duration(stage, start.elapsed().as_secs_f32());
        result
    }
}

fn measure<T>(stage: Stage, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let r = f();
    metrics::observe_stage_duration(stage, start.elapsed().as_secs_f32());
    r
}
