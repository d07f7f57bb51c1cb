use std::path::PathBuf;

use thiserror::Error;

/// imagen 库的错误类型
#[derive(Debug, Error)]
pub enum Error {
    /// 待导入的图片不存在
    #[error("找不到原始图片: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// 描述服务没有返回可用的图片描述，此时不会写入任何记录
    #[error("图片描述缺失: {}", .0.display())]
    DescriptionMissing(PathBuf),

    /// 嵌入或描述服务返回了非成功状态
    #[error("上游服务错误 ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("请求上游服务失败: {0}")]
    Http(#[from] reqwest::Error),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("未知的距离度量: {0}")]
    UnknownMetric(String),

    #[error("向量维度不匹配: {column} 期望 {expected}，实际 {actual}")]
    DimensionMismatch { column: &'static str, expected: usize, actual: usize },

    /// 已存在的表与当前配置的向量维度不一致，需要迁移
    #[error("表 {table} 的向量维度为 {found:?}，与配置 {expected:?} 不一致")]
    SchemaMismatch { table: String, expected: (usize, usize), found: (usize, usize) },

    #[error("无效的表名: {0}")]
    InvalidTableName(String),

    #[error("图片名称已存在: {0}")]
    DuplicateName(String),

    #[error("配置错误: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
