use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::Collection;
use mongodb::bson::{Bson, Document, doc};

use crate::config::StoreOptions;

/// 数据库中的一张参考图片
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// 文档 ID
    pub id: Option<String>,
    /// base64 图片
    pub image: String,
}

/// 向量最近邻搜索
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 返回与 `query` 最接近的至多 `limit` 条记录，越相似越靠前
    ///
    /// `num_candidates` 为近似搜索在最终排序前考察的候选数量。
    async fn nearest(
        &self,
        query: &[f32],
        num_candidates: u32,
        limit: u32,
    ) -> Result<Vec<Candidate>>;
}

/// 基于 Atlas Vector Search 的实现
pub struct MongoVectorStore {
    collection: Collection<Document>,
    index: String,
    path: String,
    image_field: String,
}

impl MongoVectorStore {
    pub fn new(db: &mongodb::Database, opts: &StoreOptions) -> Self {
        Self {
            collection: db.collection(&opts.collection),
            index: opts.vector_index.clone(),
            path: opts.embedding_path.clone(),
            image_field: opts.image_field.clone(),
        }
    }

    /// 构建聚合查询，只投影图片字段
    fn pipeline(&self, query: &[f32], num_candidates: u32, limit: u32) -> Vec<Document> {
        let query_vector: Vec<f64> = query.iter().map(|&v| v as f64).collect();
        let mut projection = Document::new();
        projection.insert(self.image_field.as_str(), 1);
        vec![
            doc! {
                "$vectorSearch": {
                    "index": self.index.as_str(),
                    "path": self.path.as_str(),
                    "queryVector": query_vector,
                    "numCandidates": num_candidates as i64,
                    "limit": limit as i64,
                }
            },
            doc! { "$project": projection },
        ]
    }

    fn to_candidate(&self, doc: &Document) -> Result<Candidate> {
        let image = doc
            .get_str(&self.image_field)
            .map_err(|e| anyhow!("文档缺少图片字段 {}: {e}", self.image_field))?;
        let id = doc.get("_id").map(|id| match id {
            Bson::ObjectId(oid) => oid.to_hex(),
            Bson::String(s) => s.clone(),
            other => other.to_string(),
        });
        Ok(Candidate { id, image: image.to_string() })
    }
}

#[async_trait]
impl VectorStore for MongoVectorStore {
    async fn nearest(
        &self,
        query: &[f32],
        num_candidates: u32,
        limit: u32,
    ) -> Result<Vec<Candidate>> {
        let pipeline = self.pipeline(query, num_candidates, limit);
        let mut cursor = self.collection.aggregate(pipeline).await?;
        let mut candidates = Vec::with_capacity(limit as usize);
        while let Some(doc) = cursor.try_next().await? {
            if candidates.len() == limit as usize {
                break;
            }
            candidates.push(self.to_candidate(&doc)?);
        }
        Ok(candidates)
    }
}
