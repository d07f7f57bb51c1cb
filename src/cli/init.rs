use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use indicatif::ProgressBar;
use log::info;

use crate::cli::{SubCommandExtend, open_with_services};
use crate::config::Opts;
use crate::ingest::{Converted, ImageScan, SUPPORTED_SUFFIXES, suffix_regex};
use crate::upsert::SaveOutcome;
use crate::utils::pb_style;

#[derive(Parser, Debug, Clone)]
pub struct InitCommand {
    /// 图片所在目录，会递归扫描子目录
    pub path: PathBuf,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = SUPPORTED_SUFFIXES)]
    pub suffix: String,
}

impl SubCommandExtend for InitCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let re_suf = suffix_regex(&self.suffix)?;
        let db = open_with_services(opts).await?;

        let scan = ImageScan::new(&self.path, &re_suf);
        let pb = ProgressBar::new(scan.len() as u64).with_style(pb_style());

        let (mut inserted, mut updated, mut skipped) = (0, 0, 0);
        let mut conversion = db.convert_dir(scan);
        while let Some(converted) = conversion.next().await {
            match converted {
                Converted::Record(data) => {
                    let name = data.name.clone();
                    match db.save(data).await {
                        Ok(saved) => {
                            match saved.outcome {
                                SaveOutcome::Inserted => inserted += 1,
                                SaveOutcome::Updated => updated += 1,
                            }
                            pb.set_message(format!("已保存 {}", saved.name));
                        }
                        Err(error) => {
                            pb.println(format!("[ERR] {name}: {error}"));
                            skipped += 1;
                        }
                    }
                }
                Converted::Skipped { path, error } => {
                    pb.println(format!("[ERR] {}: {}", path.display(), error));
                    skipped += 1;
                }
            }
            pb.inc(1);
        }
        pb.finish_with_message("导入完成");

        info!("新增 {inserted} 张，更新 {updated} 张，跳过 {skipped} 张");
        println!("Table {} has {} rows", db.table().name(), db.count().await?);
        db.close().await;
        Ok(())
    }
}
