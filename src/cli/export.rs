use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use crate::cli::{SubCommandExtend, open_imagen};
use crate::config::Opts;

#[derive(Parser, Debug, Clone)]
pub struct ExportCommand {
    /// 输出文件，格式为 JSON
    #[arg(short, long, default_value = "images_data.json")]
    pub output: PathBuf,
    /// 只导出描述中包含该文本的图片
    #[arg(long, value_name = "TEXT")]
    pub contains: Option<String>,
}

impl SubCommandExtend for ExportCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let db = open_imagen(opts).await?;
        let images = db.export(self.contains.as_deref()).await?;
        let data = serde_json::to_vec_pretty(&images)?;
        tokio::fs::write(&self.output, data).await?;
        info!("导出 {} 条记录到 {}", images.len(), self.output.display());
        db.close().await;
        Ok(())
    }
}
