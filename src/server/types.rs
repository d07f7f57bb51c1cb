use axum::body::Bytes;
use axum_typed_multipart::{FieldData, TryFromMultipart};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::Image;
use crate::upsert::SaveOutcome;

/// 单条搜索结果
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    /// 图片名称
    pub name: String,
    /// 图片描述
    pub description: String,
    /// 图片地址
    pub url: String,
    /// 与查询的距离，合并搜索时为两种搜索距离的平均值
    pub distance: Option<f32>,
}

impl From<Image> for SearchResponse {
    fn from(image: Image) -> Self {
        Self { url: image.url(), name: image.name, description: image.description, distance: image.distance }
    }
}

/// 文本搜索请求
#[derive(Debug, Deserialize, ToSchema)]
pub struct TextSearchRequest {
    /// 搜索文本
    pub search: String,
    /// 结果数量
    pub limit: Option<usize>,
    /// 距离度量：l2、cosine 或 dot
    pub metric: Option<String>,
}

/// 上传图片请求
#[derive(TryFromMultipart)]
pub struct UploadRequest {
    #[form_data(limit = "10MiB")]
    pub file: FieldData<Bytes>,
}

/// 以图搜图请求
#[derive(TryFromMultipart)]
pub struct ImageSearchRequest {
    #[form_data(limit = "10MiB")]
    pub file: FieldData<Bytes>,
    pub limit: Option<usize>,
    pub metric: Option<String>,
}

/// 图片和文本合并搜索请求
#[derive(TryFromMultipart)]
pub struct TextImageSearchRequest {
    #[form_data(limit = "10MiB")]
    pub file: FieldData<Bytes>,
    pub search: String,
    pub limit: Option<usize>,
    pub metric: Option<String>,
}

/// 上传表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct UploadForm {
    /// 上传的图片文件
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
}

/// 以图搜图表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct ImageSearchForm {
    /// 被搜索的图片
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// 结果数量
    pub limit: Option<usize>,
    /// 距离度量
    pub metric: Option<String>,
}

/// 合并搜索表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct TextImageSearchForm {
    /// 被搜索的图片
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// 搜索文本
    pub search: String,
    /// 结果数量，默认为 5
    pub limit: Option<usize>,
    /// 距离度量
    pub metric: Option<String>,
}

/// 上传结果
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    /// 上传的文件名
    pub name: String,
    /// 图片目录中保存的文件名
    pub path: String,
    /// 插入或更新
    #[schema(value_type = String)]
    pub output: SaveOutcome,
}

/// 图片表的一列
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

/// 图片表统计
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatsResponse {
    /// 表名
    pub table: String,
    /// 记录数量
    pub count: u64,
    pub columns: Vec<ColumnInfo>,
}
