use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgGroup, Parser};

use crate::cli::{SubCommandExtend, open_with_services};
use crate::config::{Opts, OutputFormat};
use crate::db::Image;
use crate::distance::Metric;
use crate::search::DEFAULT_LIMIT;

#[derive(Parser, Debug, Clone)]
#[command(group(ArgGroup::new("query").required(true).multiple(true).args(["image", "text"])))]
pub struct SearchCommand {
    /// 被搜索的图片路径
    #[arg(long)]
    pub image: Option<PathBuf>,
    /// 搜索文本，同时指定图片时会合并两种搜索的结果
    #[arg(long)]
    pub text: Option<String>,
    /// 显示的结果数量
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,
    /// 距离度量
    #[arg(long, value_enum, default_value_t = Metric::L2)]
    pub metric: Metric,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let db = open_with_services(opts).await?;
        let result = match (&self.image, &self.text) {
            (Some(image), Some(text)) => {
                db.combined_search(image, text, self.limit, self.metric).await?
            }
            (Some(image), None) => db.image_search(image, self.limit, self.metric).await?,
            (None, Some(text)) => db.text_search(text, self.limit, self.metric).await?,
            (None, None) => anyhow::bail!("需要指定 --image 或 --text"),
        };
        db.close().await;
        print_result(&result, self.output_format)
    }
}

fn print_result(result: &[Image], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for image in result {
                let distance = image.distance.map(|d| format!("{d:.4}")).unwrap_or_default();
                println!("{}\t{}\t{}", distance, image.name, image.description);
            }
        }
    }
    Ok(())
}
