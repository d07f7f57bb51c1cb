use std::path::Path;
use std::time::Instant;

use log::debug;

use crate::db::{Image, ImageTable, VectorColumn};
use crate::distance::Metric;
use crate::error::Result;
use crate::fusion;
use crate::metrics;
use crate::service::Embedder;

/// 默认返回的结果数量
pub const DEFAULT_LIMIT: usize = 10;

/// 按模态进行最近邻搜索
///
/// 嵌入服务出错时返回错误，没有匹配结果时返回空列表
#[derive(Debug, Clone)]
pub struct Searcher<S> {
    table: ImageTable,
    services: S,
}

impl<S> Searcher<S> {
    pub fn new(table: ImageTable, services: S) -> Self {
        Self { table, services }
    }
}

impl<S: Embedder> Searcher<S> {
    /// 以图搜图
    pub async fn image_search(
        &self,
        image_path: &Path,
        limit: usize,
        metric: Metric,
    ) -> Result<Vec<Image>> {
        let start = Instant::now();
        let embedding = self.services.embed_image(image_path).await?;
        let result = self.table.search(&embedding, VectorColumn::Image, limit, metric).await?;
        let elapsed = start.elapsed().as_secs_f32();
        debug!("图片搜索 {} 耗时 {:.2}s，结果 {} 条", image_path.display(), elapsed, result.len());
        metrics::inc_search("image", metric.as_str(), elapsed);
        Ok(result)
    }

    /// 以文搜图，搜索图片描述的文本向量
    pub async fn text_search(&self, query: &str, limit: usize, metric: Metric) -> Result<Vec<Image>> {
        let start = Instant::now();
        let embedding = self.services.embed_text(query).await?;
        let result = self.table.search(&embedding, VectorColumn::Text, limit, metric).await?;
        let elapsed = start.elapsed().as_secs_f32();
        debug!("文本搜索 {:?} 耗时 {:.2}s，结果 {} 条", query, elapsed, result.len());
        metrics::inc_search("text", metric.as_str(), elapsed);
        Ok(result)
    }

    /// 同时以图片和文本搜索，两个搜索并发执行，结果按名次合并
    pub async fn combined_search(
        &self,
        image_path: &Path,
        query: &str,
        limit: usize,
        metric: Metric,
    ) -> Result<Vec<Image>> {
        let (res_image, res_text) = tokio::try_join!(
            self.image_search(image_path, limit, metric),
            self.text_search(query, limit, metric),
        )?;
        Ok(fusion::combine(res_image, res_text, limit))
    }
}
