use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::db::{Image, ImageData, ImageTable, ImageUpdate, VectorColumn};
use crate::distance::Metric;
use crate::error::Result;
use crate::{metrics, utils};

/// 保存图片的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveOutcome {
    /// 新图片，插入了一条新记录
    Inserted,
    /// 已存在的图片，更新了原记录
    Updated,
}

/// 保存结果，`name` 为实际写入的记录名称
///
/// 更新已有图片时 `name` 是原记录的名称，而不是新复制的文件名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Saved {
    pub name: String,
    pub outcome: SaveOutcome,
}

/// 查重时检查的最近邻数量
const DUPLICATE_CANDIDATES: usize = 8;

impl SaveOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated => "updated",
        }
    }
}

/// 根据图片向量判断图片是否已存在，并插入或更新记录
///
/// 图片文件名在保存前已被随机化，因此这里只能通过向量判断是否重复
#[derive(Debug, Clone)]
pub struct Upserter {
    table: ImageTable,
    image_dir: PathBuf,
    // 查重和写入之间持有，避免同一张新图片被并发插入两次
    lock: Arc<Mutex<()>>,
}

impl Upserter {
    pub fn new(table: ImageTable, image_dir: impl Into<PathBuf>) -> Self {
        Self { table, image_dir: image_dir.into(), lock: Arc::new(Mutex::new(())) }
    }

    /// 保存图片
    ///
    /// 最近邻的图片向量与输入逐元素相等时视为同一张图片：保留原有的名称和创建时间，
    /// 覆盖描述和两个向量；否则插入新记录
    pub async fn save(&self, image: ImageData) -> Result<Saved> {
        let _guard = self.lock.lock().await;

        // 不同向量的平方距离也可能下溢为 0，需要检查所有距离为 0 的候选
        let matched = self
            .table
            .search(&image.image_embedding, VectorColumn::Image, DUPLICATE_CANDIDATES, Metric::L2)
            .await?
            .into_iter()
            .take_while(|candidate| candidate.distance == Some(0.))
            .find(|candidate| candidate.matching_vector(&image.image_embedding));

        let saved = match matched {
            Some(matched) => {
                info!("更新图片 {} (已存在为 {})", image.name, matched.name);
                let values = ImageUpdate {
                    description: &image.description,
                    image_embedding: &image.image_embedding,
                    text_embedding: &image.text_embedding,
                    updated: utils::now_millis().max(matched.created),
                };
                self.table.update(&matched.name, &values).await?;
                self.settle_files(&matched, &image).await?;
                Saved { name: matched.name, outcome: SaveOutcome::Updated }
            }
            None => {
                info!("创建图片 {}", image.name);
                let name = image.name.clone();
                let now = utils::now_millis();
                self.table.insert(&image.into_image(now, now)).await?;
                Saved { name, outcome: SaveOutcome::Inserted }
            }
        };

        metrics::inc_upsert(saved.outcome.as_str());
        Ok(saved)
    }

    /// 重复上传的图片会在图片目录中留下一份新文件，记录仍然指向旧文件名
    ///
    /// 旧文件存在时删除新文件；旧文件丢失时将新文件改名为旧文件名，保证记录始终有对应的文件
    async fn settle_files(&self, matched: &Image, image: &ImageData) -> Result<()> {
        let Some(path) = &image.path else {
            return Ok(());
        };
        let kept = self.image_dir.join(&matched.name);
        if same_file(path, &kept) || !path.exists() {
            return Ok(());
        }

        if kept.exists() {
            info!("删除重复文件: {}", path.display());
            tokio::fs::remove_file(path).await?;
        } else {
            warn!("文件 {} 丢失，使用 {} 代替", kept.display(), path.display());
            tokio::fs::rename(path, &kept).await?;
        }
        Ok(())
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
