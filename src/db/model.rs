use std::path::PathBuf;

use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

/// 图片表中的向量列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorColumn {
    /// 图片嵌入向量
    Image,
    /// 图片描述的文本嵌入向量
    Text,
}

impl VectorColumn {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Image => "image_vector",
            Self::Text => "text_vector",
        }
    }
}

/// 图片记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Image {
    /// 图片名称，同时也是图片目录中的文件名
    pub name: String,
    /// 图片描述
    pub description: String,
    #[serde(skip)]
    pub image_embedding: Vec<f32>,
    #[serde(skip)]
    pub text_embedding: Vec<f32>,
    /// 创建时间，毫秒时间戳
    pub created: i64,
    /// 更新时间，毫秒时间戳
    pub updated: i64,
    /// 搜索结果中与查询向量的距离，不会持久化
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
}

impl Image {
    /// 图片的访问地址
    pub fn url(&self) -> String {
        format!("/image/{}", self.name)
    }

    pub fn vector(&self, column: VectorColumn) -> &[f32] {
        match column {
            VectorColumn::Image => &self.image_embedding,
            VectorColumn::Text => &self.text_embedding,
        }
    }

    /// 图片向量是否逐元素完全相等
    pub fn matching_vector(&self, embedding: &[f32]) -> bool {
        self.image_embedding.as_slice() == embedding
    }
}

impl<'r> FromRow<'r, SqliteRow> for Image {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        let image_vector: &[u8] = row.try_get("image_vector")?;
        let text_vector: &[u8] = row.try_get("text_vector")?;
        Ok(Self {
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            image_embedding: decode_vector(image_vector),
            text_embedding: decode_vector(text_vector),
            created: row.try_get("created")?,
            updated: row.try_get("updated")?,
            distance: None,
        })
    }
}

/// 待保存的图片数据
#[derive(Debug, Clone)]
pub struct ImageData {
    /// 图片目录中的文件名
    pub name: String,
    pub description: String,
    pub image_embedding: Vec<f32>,
    pub text_embedding: Vec<f32>,
    /// 复制到图片目录中的文件路径
    pub path: Option<PathBuf>,
}

impl ImageData {
    /// 转换为新的图片记录
    pub fn into_image(self, created: i64, updated: i64) -> Image {
        Image {
            name: self.name,
            description: self.description,
            image_embedding: self.image_embedding,
            text_embedding: self.text_embedding,
            created,
            updated,
            distance: None,
        }
    }
}

/// 向量以本机字节序的 f32 数组存储
pub fn encode_vector(vector: &[f32]) -> &[u8] {
    bytemuck::cast_slice(vector)
}

pub fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(size_of::<f32>()).map(bytemuck::pod_read_unaligned).collect()
}
