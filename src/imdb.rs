use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::ConfDir;
use crate::db::{Filter, Image, ImageData, ImageTable, TableSchema};
use crate::distance::Metric;
use crate::error::{Error, Result};
use crate::ingest::{Conversion, ImageScan, Ingestor};
use crate::search::Searcher;
use crate::service::{Captioner, Embedder, Generator, ImageSize};
use crate::sync::{SyncReport, Synchronizer};
use crate::upsert::{Saved, Upserter};

/// 默认的图片表名
pub const DEFAULT_TABLE: &str = "tbl_image";

pub struct ImagenBuilder {
    conf_dir: ConfDir,
    image_dir: Option<PathBuf>,
    table: String,
    schema: TableSchema,
}

impl ImagenBuilder {
    pub fn new(conf_dir: ConfDir) -> Self {
        Self { conf_dir, image_dir: None, table: DEFAULT_TABLE.to_owned(), schema: TableSchema::default() }
    }

    /// 图片目录，默认为配置目录下的 `images`
    pub fn image_dir(mut self, image_dir: Option<PathBuf>) -> Self {
        self.image_dir = image_dir;
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn schema(mut self, schema: TableSchema) -> Self {
        self.schema = schema;
        self
    }

    /// 打开或创建图片表
    ///
    /// 图片目录不能是数据库所在的目录，否则同步时会把数据库文件当作多余的图片删除
    pub async fn open(self) -> Result<Imagen> {
        let image_dir = self.image_dir.unwrap_or_else(|| self.conf_dir.images());
        let database = self.conf_dir.database();
        tokio::fs::create_dir_all(&image_dir).await?;
        tokio::fs::create_dir_all(self.conf_dir.path()).await?;

        let image_dir_real = tokio::fs::canonicalize(&image_dir).await?;
        let conf_dir_real = tokio::fs::canonicalize(self.conf_dir.path()).await?;
        if image_dir_real == conf_dir_real {
            return Err(Error::Config(format!(
                "图片目录 {} 中包含数据库文件 {}",
                image_dir.display(),
                database.display()
            )));
        }

        let table = ImageTable::open_or_create(&database, &self.table, self.schema).await?;
        info!("图片表 {} 共 {} 条记录", table.name(), table.count().await?);

        Ok(Imagen {
            conf_dir: self.conf_dir,
            upserter: Upserter::new(table.clone(), &image_dir),
            synchronizer: Synchronizer::new(table.clone(), &image_dir).keep_database(&database),
            ingestor: Ingestor::new((), &image_dir),
            searcher: Searcher::new(table.clone(), ()),
            image_dir,
            table,
        })
    }
}

/// 图片库
///
/// 持有唯一的图片表句柄，并将其注入各个组件。`S` 为模型服务，不需要模型服务时为 `()`
pub struct Imagen<S = ()> {
    conf_dir: ConfDir,
    image_dir: PathBuf,
    table: ImageTable,
    upserter: Upserter,
    synchronizer: Synchronizer,
    ingestor: Ingestor<S>,
    searcher: Searcher<S>,
}

impl Imagen<()> {
    /// 设置模型服务
    pub fn with_services<S: Clone>(self, services: S) -> Imagen<S> {
        Imagen {
            ingestor: Ingestor::new(services.clone(), &self.image_dir),
            searcher: Searcher::new(self.table.clone(), services),
            conf_dir: self.conf_dir,
            image_dir: self.image_dir,
            table: self.table,
            upserter: self.upserter,
            synchronizer: self.synchronizer,
        }
    }
}

impl<S> Imagen<S> {
    pub fn conf_dir(&self) -> &ConfDir {
        &self.conf_dir
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    pub fn table(&self) -> &ImageTable {
        &self.table
    }

    pub async fn count(&self) -> Result<u64> {
        self.table.count().await
    }

    /// 保存已经转换好的图片
    ///
    /// 保存失败时删除转换时复制到图片目录中的文件
    pub async fn save(&self, image: ImageData) -> Result<Saved> {
        let stored = image.path.clone();
        let result = self.upserter.save(image).await;
        if let (Err(e), Some(path)) = (&result, stored) {
            warn!("保存 {} 失败: {}，删除文件", path.display(), e);
            match tokio::fs::remove_file(&path).await {
                Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
                    warn!("删除文件 {} 失败: {}", path.display(), err);
                }
                _ => {}
            }
        }
        result
    }

    /// 同步图片表和图片目录
    pub async fn synchronize(&self, limit: usize) -> Result<SyncReport> {
        self.synchronizer.synchronize(limit).await
    }

    /// 导出图片记录，可以按描述过滤
    pub async fn export(&self, contains: Option<&str>) -> Result<Vec<Image>> {
        let filter = contains.map(Filter::DescriptionContains);
        self.table.select(filter.as_ref(), None).await
    }

    /// 关闭图片表
    pub async fn close(self) {
        self.table.close().await;
    }
}

impl<S: Embedder + Captioner> Imagen<S> {
    pub fn ingestor(&self) -> &Ingestor<S> {
        &self.ingestor
    }

    pub fn searcher(&self) -> &Searcher<S> {
        &self.searcher
    }

    /// 转换并保存一张图片
    pub async fn save_image_from_path(&self, path: &Path) -> Result<Saved> {
        let data = self.ingestor.convert(path).await?;
        self.save(data).await
    }

    /// 生成图片并保存到图片库
    ///
    /// 生成的图片先下载到临时目录，再和普通图片一样转换保存，保存失败的图片会被跳过
    pub async fn generate(
        &self,
        generator: &Generator,
        prompt: &str,
        n: usize,
        size: ImageSize,
    ) -> Result<Vec<Saved>> {
        let dir = tempfile::tempdir()?;
        let mut saved = vec![];
        for path in generator.generate(prompt, n, size, dir.path()).await? {
            match self.save_image_from_path(&path).await {
                Ok(result) => saved.push(result),
                Err(e) => warn!("保存生成的图片 {} 失败: {}", path.display(), e),
            }
        }
        Ok(saved)
    }

    /// 逐张转换目录中的图片
    pub fn convert_dir(&self, scan: ImageScan) -> Conversion<'_, S> {
        Conversion::new(&self.ingestor, scan)
    }

    pub async fn image_search(&self, path: &Path, limit: usize, metric: Metric) -> Result<Vec<Image>> {
        self.searcher.image_search(path, limit, metric).await
    }

    pub async fn text_search(&self, query: &str, limit: usize, metric: Metric) -> Result<Vec<Image>> {
        self.searcher.text_search(query, limit, metric).await
    }

    pub async fn combined_search(
        &self,
        path: &Path,
        query: &str,
        limit: usize,
        metric: Metric,
    ) -> Result<Vec<Image>> {
        self.searcher.combined_search(path, query, limit, metric).await
    }
}
