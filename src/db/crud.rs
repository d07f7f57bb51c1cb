use futures::TryStreamExt;
use sqlx::{Executor, Result, Sqlite, SqlitePool};

use super::{Filter, Image, encode_vector};

/// 查询图片表时使用的列
pub const IMAGE_COLUMNS: &str = "name, description, image_vector, text_vector, created, updated";

/// 记录各个图片表的向量维度
const SCHEMA_TABLE: &str = "imagen_schema";

/// 检查表是否存在
pub async fn table_exists(executor: &SqlitePool, table: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_one(executor)
            .await?;
    Ok(count > 0)
}

/// 创建图片表，并记录向量维度
///
/// 向量长度和时间戳顺序由 CHECK 约束保证
pub async fn create_table(
    executor: &SqlitePool,
    table: &str,
    image_vector_size: usize,
    text_vector_size: usize,
) -> Result<()> {
    let mut tx = executor.begin().await?;
    create_schema_table(&mut *tx).await?;
    let sql = format!(
        r#"
        CREATE TABLE "{table}" (
            name        TEXT    NOT NULL PRIMARY KEY,
            description TEXT    NOT NULL,
            image_vector BLOB   NOT NULL CHECK (length(image_vector) = {}),
            text_vector BLOB    NOT NULL CHECK (length(text_vector) = {}),
            created     INTEGER NOT NULL,
            updated     INTEGER NOT NULL,
            CHECK (created <= updated)
        )
        "#,
        image_vector_size * size_of::<f32>(),
        text_vector_size * size_of::<f32>(),
    );
    sqlx::query(&sql).execute(&mut *tx).await?;
    set_vector_sizes(&mut *tx, table, image_vector_size, text_vector_size).await?;
    tx.commit().await?;
    Ok(())
}

async fn create_schema_table<'c, E>(executor: E) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    let sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {SCHEMA_TABLE} (
            table_name        TEXT    NOT NULL PRIMARY KEY,
            image_vector_size INTEGER NOT NULL,
            text_vector_size  INTEGER NOT NULL
        )
        "#
    );
    sqlx::query(&sql).execute(executor).await?;
    Ok(())
}

/// 写入表的向量维度记录
pub async fn set_vector_sizes<'c, E>(
    executor: E,
    table: &str,
    image_vector_size: usize,
    text_vector_size: usize,
) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    let sql = format!(
        "INSERT INTO {SCHEMA_TABLE} (table_name, image_vector_size, text_vector_size) VALUES (?, ?, ?)"
    );
    sqlx::query(&sql)
        .bind(table)
        .bind(image_vector_size as i64)
        .bind(text_vector_size as i64)
        .execute(executor)
        .await?;
    Ok(())
}

/// 读取表的向量维度记录，返回 (图片向量维度, 文本向量维度)
pub async fn get_vector_sizes(executor: &SqlitePool, table: &str) -> Result<Option<(usize, usize)>> {
    create_schema_table(executor).await?;
    let sql = format!(
        "SELECT image_vector_size, text_vector_size FROM {SCHEMA_TABLE} WHERE table_name = ?"
    );
    let row: Option<(i64, i64)> = sqlx::query_as(&sql).bind(table).fetch_optional(executor).await?;
    Ok(row.map(|(image, text)| (image as usize, text as usize)))
}

/// 插入图片记录
pub async fn insert_image<'c, E>(executor: E, table: &str, image: &Image) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    let sql = format!(r#"INSERT INTO "{table}" ({IMAGE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)"#);
    sqlx::query(&sql)
        .bind(&image.name)
        .bind(&image.description)
        .bind(encode_vector(&image.image_embedding))
        .bind(encode_vector(&image.text_embedding))
        .bind(image.created)
        .bind(image.updated)
        .execute(executor)
        .await?;
    Ok(())
}

/// 根据条件更新图片的描述、向量和更新时间，返回受影响的行数
pub async fn update_images<'c, E>(
    executor: E,
    table: &str,
    filter: &Filter<'_>,
    values: &ImageUpdate<'_>,
) -> Result<u64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let sql = format!(
        r#"
        UPDATE "{table}"
        SET description = ?, image_vector = ?, text_vector = ?, updated = ?
        WHERE {}
        "#,
        filter.to_sql()
    );
    let result = sqlx::query(&sql)
        .bind(values.description)
        .bind(encode_vector(values.image_embedding))
        .bind(encode_vector(values.text_embedding))
        .bind(values.updated)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// 根据条件删除图片记录，返回删除的行数
pub async fn delete_images<'c, E>(executor: E, table: &str, filter: &Filter<'_>) -> Result<u64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let sql = format!(r#"DELETE FROM "{table}" WHERE {}"#, filter.to_sql());
    let result = sqlx::query(&sql).execute(executor).await?;
    Ok(result.rows_affected())
}

/// 按插入顺序查询图片记录
pub async fn select_images(
    executor: &SqlitePool,
    table: &str,
    filter: Option<&Filter<'_>>,
    limit: Option<usize>,
) -> Result<Vec<Image>> {
    let mut sql = format!(r#"SELECT {IMAGE_COLUMNS} FROM "{table}""#);
    if let Some(filter) = filter {
        sql.push_str(" WHERE ");
        sql.push_str(&filter.to_sql());
    }
    sql.push_str(" ORDER BY rowid");
    if let Some(limit) = limit {
        // SQLite 的 LIMIT 是有符号 64 位整数
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    sqlx::query_as::<_, Image>(&sql).fetch_all(executor).await
}

/// 逐行扫描整张表，对每条记录调用 `f`
pub async fn scan_images<F>(executor: &SqlitePool, table: &str, mut f: F) -> Result<()>
where
    F: FnMut(Image),
{
    let sql = format!(r#"SELECT {IMAGE_COLUMNS} FROM "{table}" ORDER BY rowid"#);
    let mut rows = sqlx::query_as::<_, Image>(&sql).fetch(executor);
    while let Some(image) = rows.try_next().await? {
        f(image);
    }
    Ok(())
}

/// 查询图片数量
pub async fn count_images(executor: &SqlitePool, table: &str) -> Result<u64> {
    let sql = format!(r#"SELECT COUNT(*) FROM "{table}""#);
    let count: i64 = sqlx::query_scalar(&sql).fetch_one(executor).await?;
    Ok(count as u64)
}

/// 重复导入时需要覆盖的字段
#[derive(Debug, Clone, Copy)]
pub struct ImageUpdate<'a> {
    pub description: &'a str,
    pub image_embedding: &'a [f32],
    pub text_embedding: &'a [f32],
    pub updated: i64,
}
