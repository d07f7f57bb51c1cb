use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use regex::Regex;
use walkdir::WalkDir;

use crate::db::ImageData;
use crate::error::{Error, Result};
use crate::service::{Captioner, Embedder};
use crate::utils;

/// 默认支持的图片格式
pub const SUPPORTED_SUFFIXES: &str = "png,jpg,jpeg,webp";

/// 将图片复制到图片目录，并生成描述和向量
#[derive(Debug, Clone)]
pub struct Ingestor<S> {
    services: S,
    image_dir: PathBuf,
}

impl<S> Ingestor<S> {
    pub fn new(services: S, image_dir: impl Into<PathBuf>) -> Self {
        Self { services, image_dir: image_dir.into() }
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }
}

impl<S: Embedder + Captioner> Ingestor<S> {
    /// 转换单张图片
    ///
    /// 失败时会删除已经复制到图片目录中的文件
    pub async fn convert(&self, source: &Path) -> Result<ImageData> {
        if !source.is_file() {
            return Err(Error::SourceNotFound(source.to_path_buf()));
        }
        info!("===== {} =====", source.display());

        let stored = self.copy_to_image_dir(source).await?;
        match self.describe_and_embed(source, &stored).await {
            Ok(data) => Ok(data),
            Err(e) => {
                if let Err(err) = tokio::fs::remove_file(&stored).await {
                    warn!("删除文件 {} 失败: {}", stored.display(), err);
                }
                Err(e)
            }
        }
    }

    async fn describe_and_embed(&self, source: &Path, stored: &Path) -> Result<ImageData> {
        let description = self
            .services
            .describe(stored)
            .await?
            .ok_or_else(|| Error::DescriptionMissing(source.to_path_buf()))?;
        debug!("图片描述: {}", description);

        let image_embedding = self.services.embed_image(stored).await?;
        let text_embedding = self.services.embed_text(&description).await?;

        let name = stored
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| Error::SourceNotFound(stored.to_path_buf()))?;

        Ok(ImageData {
            name,
            description,
            image_embedding,
            text_embedding,
            path: Some(stored.to_path_buf()),
        })
    }

    /// 以随机化的文件名复制到图片目录
    async fn copy_to_image_dir(&self, source: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.image_dir).await?;
        let target = self.image_dir.join(utils::storage_name(source));
        debug!("复制 {} 到 {}", source.display(), target.display());
        tokio::fs::copy(source, &target).await?;
        Ok(target)
    }
}

/// 根据逗号分隔的后缀名生成匹配扩展名的正则
pub fn suffix_regex(suffix: &str) -> Result<Regex> {
    let re = format!("(?i)^({})$", suffix.replace(',', "|"));
    Regex::new(&re).map_err(|e| Error::Config(format!("无效的后缀名 {suffix}: {e}")))
}

/// 目录中待导入的图片列表
#[derive(Debug, Clone)]
pub struct ImageScan {
    files: Vec<PathBuf>,
}

impl ImageScan {
    /// 递归扫描目录，按路径排序
    pub fn new(dir: &Path, suffix: &Regex) -> Self {
        let mut files = WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.is_file()
                    && path.extension().is_some_and(|ext| suffix.is_match(&ext.to_string_lossy()))
            })
            .collect::<Vec<_>>();
        files.sort();
        info!("扫描完成，共 {} 张图片", files.len());
        Self { files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

/// 单张图片的转换结果
#[derive(Debug)]
pub enum Converted {
    Record(ImageData),
    /// 转换失败的图片会被跳过
    Skipped { path: PathBuf, error: Error },
}

/// 逐张转换扫描到的图片
///
/// 只有调用 [`Conversion::next`] 时才会处理下一张图片，不会并发处理
pub struct Conversion<'a, S> {
    ingestor: &'a Ingestor<S>,
    scan: ImageScan,
    cursor: usize,
}

impl<'a, S: Embedder + Captioner> Conversion<'a, S> {
    pub fn new(ingestor: &'a Ingestor<S>, scan: ImageScan) -> Self {
        Self { ingestor, scan, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.scan.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scan.is_empty()
    }

    /// 从头开始重新转换
    pub fn restart(&mut self) {
        self.cursor = 0;
    }

    pub async fn next(&mut self) -> Option<Converted> {
        let path = self.scan.files.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(match self.ingestor.convert(&path).await {
            Ok(data) => Converted::Record(data),
            Err(error) => Converted::Skipped { path, error },
        })
    }
}
