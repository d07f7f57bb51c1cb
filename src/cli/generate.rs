use anyhow::Result;
use clap::Parser;

use crate::cli::{SubCommandExtend, open_with_services};
use crate::config::Opts;
use crate::service::{Generator, ImageSize};

#[derive(Parser, Debug, Clone)]
pub struct GenerateCommand {
    /// 图片描述
    pub prompt: String,
    /// 生成的图片数量
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub number: u8,
    /// 图片尺寸
    #[arg(long, value_enum, default_value_t = ImageSize::Square)]
    pub size: ImageSize,
}

impl SubCommandExtend for GenerateCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let generator = Generator::new(&opts.provider.to_service_config())?;
        let db = open_with_services(opts).await?;

        let saved = db.generate(&generator, &self.prompt, self.number as usize, self.size).await?;
        for image in &saved {
            println!("[OK] {} {}", image.outcome.as_str(), image.name);
        }
        println!("Generated {} of {} images", saved.len(), self.number);
        db.close().await;
        Ok(())
    }
}
