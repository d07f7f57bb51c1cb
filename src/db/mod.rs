use std::path::Path;

use log::info;
use sqlx::{SqlitePool, sqlite::*};

pub mod crud;
pub mod filter;
pub mod model;
mod table;
mod topk;

pub use crud::ImageUpdate;
pub use filter::*;
pub use model::*;
pub use table::*;

pub type Database = SqlitePool;

/// 打开 SQLite 数据库，不存在时自动创建
pub async fn init_db(filename: impl AsRef<Path>) -> Result<Database, sqlx::Error> {
    let filename = filename.as_ref();
    info!("初始化数据库连接: {}", filename.display());

    if let Some(parent) = filename.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .filename(filename)
        .create_if_missing(true);

    SqlitePool::connect_with(options).await
}
