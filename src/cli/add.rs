use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use crate::cli::{SubCommandExtend, open_with_services};
use crate::config::Opts;

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    /// 图片路径
    pub path: PathBuf,
}

impl SubCommandExtend for AddCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let db = open_with_services(opts).await?;
        info!("正在处理 {}", self.path.display());
        let saved = db.save_image_from_path(&self.path).await?;
        println!("[OK] {} {} -> {}", saved.outcome.as_str(), self.path.display(), saved.name);
        db.close().await;
        Ok(())
    }
}
