use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;

use crate::db::{Filter, ImageTable};
use crate::error::Result;

/// 一次同步的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// 删除的无记录文件数量
    pub files_removed: usize,
    /// 删除的无文件记录数量
    pub rows_removed: usize,
}

/// 同步图片表与图片目录
///
/// 两个清理步骤之间没有事务保证，同步期间新增的文件可能被误删
#[derive(Debug, Clone)]
pub struct Synchronizer {
    table: ImageTable,
    folder: PathBuf,
    // 数据库文件及其 -wal、-shm 等附属文件，永远不会被删除
    kept: Vec<PathBuf>,
}

/// SQLite 在数据库文件旁创建的附属文件后缀
const DATABASE_SUFFIXES: [&str; 4] = ["", "-wal", "-shm", "-journal"];

impl Synchronizer {
    pub fn new(table: ImageTable, folder: impl Into<PathBuf>) -> Self {
        Self { table, folder: folder.into(), kept: vec![] }
    }

    /// 清理图片目录时跳过数据库文件
    pub fn keep_database(mut self, database: impl AsRef<Path>) -> Self {
        let database = database.as_ref();
        let Some(file_name) = database.file_name() else {
            return self;
        };
        for suffix in DATABASE_SUFFIXES {
            let mut name = file_name.to_os_string();
            name.push(suffix);
            self.kept.push(database.with_file_name(name));
        }
        self
    }

    fn is_kept(&self, path: &Path) -> bool {
        self.kept.iter().any(|kept| same_location(kept, path))
    }

    /// 删除图片目录中没有对应记录的文件
    pub async fn cleanup_folder(&self) -> Result<usize> {
        let mut removed = 0;
        for path in list_files(&self.folder).await? {
            let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
                warn!("跳过无法识别的文件名: {}", path.display());
                continue;
            };
            if self.is_kept(&path) {
                warn!("图片目录中包含数据库文件 {}，跳过", name);
                continue;
            }
            let rows = self.table.select(Some(&Filter::NameEq(name)), Some(1)).await?;
            if rows.is_empty() {
                info!("找不到 {} 对应的记录，删除文件", name);
                tokio::fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// 检查前 `limit` 条记录，删除图片目录中没有对应文件的记录
    pub async fn cleanup_table(&self, limit: usize) -> Result<usize> {
        let rows = self.table.select(None, Some(limit)).await?;
        let files: HashSet<String> = list_files(&self.folder)
            .await?
            .into_iter()
            .filter_map(|p| p.file_name().and_then(|s| s.to_str()).map(str::to_owned))
            .collect();

        let mut removed = 0;
        for row in rows {
            if !files.contains(&row.name) {
                info!("图片 {} 不在图片目录中，删除记录", row.name);
                removed += self.table.delete(&row.name).await? as usize;
            }
        }
        Ok(removed)
    }

    /// 先清理图片目录，再清理图片表
    pub async fn synchronize(&self, limit: usize) -> Result<SyncReport> {
        let files_removed = self.cleanup_folder().await?;
        let rows_removed = self.cleanup_table(limit).await?;
        info!("同步完成: 删除文件 {} 个，删除记录 {} 条", files_removed, rows_removed);
        Ok(SyncReport { files_removed, rows_removed })
    }
}

/// 文件名相同且所在目录相同，目录通过 canonicalize 比较
fn same_location(a: &Path, b: &Path) -> bool {
    if a.file_name() != b.file_name() {
        return false;
    }
    match (a.parent(), b.parent()) {
        (Some(pa), Some(pb)) => match (pa.canonicalize(), pb.canonicalize()) {
            (Ok(pa), Ok(pb)) => pa == pb,
            _ => pa == pb,
        },
        (pa, pb) => pa == pb,
    }
}

/// 列出目录中的普通文件，目录不存在时返回空列表
async fn list_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut files = vec![];
    let mut entries = match tokio::fs::read_dir(folder).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
