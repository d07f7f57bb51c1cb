use std::path::Path;
use std::sync::LazyLock;

use log::{debug, info, warn};
use regex::Regex;

use super::crud::{self, ImageUpdate};
use super::topk::TopK;
use super::{Database, Filter, Image, VectorColumn, init_db};
use crate::distance::Metric;
use crate::error::{Error, Result};

static TABLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[A-Za-z_][A-Za-z0-9_]*$").expect("failed to build regex"));

/// 图片表的向量维度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub image_vector_size: usize,
    pub text_vector_size: usize,
}

impl Default for TableSchema {
    fn default() -> Self {
        Self { image_vector_size: 768, text_vector_size: 768 }
    }
}

impl TableSchema {
    pub fn size_of(&self, column: VectorColumn) -> usize {
        match column {
            VectorColumn::Image => self.image_vector_size,
            VectorColumn::Text => self.text_vector_size,
        }
    }

    /// 检查向量长度是否与列的维度一致
    pub fn check(&self, column: VectorColumn, vector: &[f32]) -> Result<()> {
        let expected = self.size_of(column);
        if vector.len() != expected {
            return Err(Error::DimensionMismatch {
                column: column.name(),
                expected,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    fn as_tuple(&self) -> (usize, usize) {
        (self.image_vector_size, self.text_vector_size)
    }
}

/// 图片表句柄
///
/// 进程启动时打开一次，之后通过克隆传递给各个组件，所有操作都直接读写数据库
#[derive(Debug, Clone)]
pub struct ImageTable {
    pool: Database,
    name: String,
    schema: TableSchema,
}

impl ImageTable {
    /// 打开数据库文件中的图片表，表不存在时创建
    pub async fn open_or_create(
        location: impl AsRef<Path>,
        table_name: &str,
        schema: TableSchema,
    ) -> Result<Self> {
        let pool = init_db(location).await?;
        Self::open_or_create_with(pool, table_name, schema).await
    }

    /// 使用已有的连接池打开图片表，表不存在时创建
    ///
    /// 已存在的表永远不会被重建，向量维度与配置不一致时返回 [`Error::SchemaMismatch`]
    pub async fn open_or_create_with(
        pool: Database,
        table_name: &str,
        schema: TableSchema,
    ) -> Result<Self> {
        if !TABLE_NAME.is_match(table_name) {
            return Err(Error::InvalidTableName(table_name.to_owned()));
        }

        if crud::table_exists(&pool, table_name).await? {
            match crud::get_vector_sizes(&pool, table_name).await? {
                Some(found) if found != schema.as_tuple() => {
                    return Err(Error::SchemaMismatch {
                        table: table_name.to_owned(),
                        expected: schema.as_tuple(),
                        found,
                    });
                }
                Some(_) => {}
                None => {
                    warn!("表 {} 缺少向量维度记录，使用当前配置", table_name);
                    crud::set_vector_sizes(
                        &pool,
                        table_name,
                        schema.image_vector_size,
                        schema.text_vector_size,
                    )
                    .await?;
                }
            }
            debug!("打开图片表: {}", table_name);
        } else {
            warn!("图片表 {} 不存在，正在创建", table_name);
            crud::create_table(
                &pool,
                table_name,
                schema.image_vector_size,
                schema.text_vector_size,
            )
            .await?;
        }

        Ok(Self { pool, name: table_name.to_owned(), schema })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> TableSchema {
        self.schema
    }

    /// 关闭连接池，之后所有克隆出的句柄都不再可用
    pub async fn close(&self) {
        info!("关闭图片表: {}", self.name);
        self.pool.close().await;
    }

    /// 插入一条完整的图片记录
    pub async fn insert(&self, image: &Image) -> Result<()> {
        self.schema.check(VectorColumn::Image, &image.image_embedding)?;
        self.schema.check(VectorColumn::Text, &image.text_embedding)?;
        crud::insert_image(&self.pool, &self.name, image).await.map_err(|e| match e {
            sqlx::Error::Database(ref err) if err.is_unique_violation() => {
                Error::DuplicateName(image.name.clone())
            }
            e => e.into(),
        })
    }

    /// 按名称更新图片记录，返回受影响的行数
    pub async fn update(&self, key: &str, values: &ImageUpdate<'_>) -> Result<u64> {
        self.schema.check(VectorColumn::Image, values.image_embedding)?;
        self.schema.check(VectorColumn::Text, values.text_embedding)?;
        Ok(crud::update_images(&self.pool, &self.name, &Filter::NameEq(key), values).await?)
    }

    /// 按名称删除图片记录，返回删除的行数
    pub async fn delete(&self, key: &str) -> Result<u64> {
        Ok(crud::delete_images(&self.pool, &self.name, &Filter::NameEq(key)).await?)
    }

    /// 查询图片记录
    pub async fn select(&self, filter: Option<&Filter<'_>>, limit: Option<usize>) -> Result<Vec<Image>> {
        Ok(crud::select_images(&self.pool, &self.name, filter, limit).await?)
    }

    /// 按名称查询单条图片记录
    pub async fn get(&self, key: &str) -> Result<Option<Image>> {
        let mut images = self.select(Some(&Filter::NameEq(key)), Some(1)).await?;
        Ok(images.pop())
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(crud::count_images(&self.pool, &self.name).await?)
    }

    /// 表的逻辑结构，格式为 `(列名, 类型)`
    pub fn columns(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", "string".to_owned()),
            ("description", "string".to_owned()),
            ("image_vector", format!("fixed_size_list<float32, {}>", self.schema.image_vector_size)),
            ("text_vector", format!("fixed_size_list<float32, {}>", self.schema.text_vector_size)),
            ("created", "timestamp[ms]".to_owned()),
            ("updated", "timestamp[ms]".to_owned()),
        ]
    }

    /// 在指定的向量列上搜索最近的 `limit` 张图片，结果按距离升序排列
    pub async fn search(
        &self,
        embedding: &[f32],
        column: VectorColumn,
        limit: usize,
        metric: Metric,
    ) -> Result<Vec<Image>> {
        self.schema.check(column, embedding)?;
        if limit == 0 {
            return Ok(vec![]);
        }

        let mut top = TopK::new(limit);
        crud::scan_images(&self.pool, &self.name, |image| {
            let distance = metric.distance(embedding, image.vector(column));
            top.push(distance, image);
        })
        .await?;

        Ok(top
            .into_sorted_vec()
            .into_iter()
            .map(|(distance, mut image)| {
                image.distance = Some(distance);
                image
            })
            .collect())
    }
}
