use anyhow::Result;
use clap::Parser;
use log::info;

use crate::cli::{SubCommandExtend, open_imagen};
use crate::config::Opts;

#[derive(Parser, Debug, Clone)]
pub struct CleanCommand {
    /// 最多检查的记录数量
    #[arg(long, default_value_t = 1000)]
    pub limit: usize,
}

impl SubCommandExtend for CleanCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let db = open_imagen(opts).await?;
        info!("同步图片目录 {} 中……", db.image_dir().display());
        let report = db.synchronize(self.limit).await?;
        println!("Removed {} files, {} rows", report.files_removed, report.rows_removed);
        db.close().await;
        Ok(())
    }
}
