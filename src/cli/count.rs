use anyhow::Result;
use clap::Parser;

use crate::cli::{SubCommandExtend, open_imagen};
use crate::config::Opts;

#[derive(Parser, Debug, Clone)]
pub struct CountCommand {}

impl SubCommandExtend for CountCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let db = open_imagen(opts).await?;
        println!("Table has {} rows", db.count().await?);
        let columns = db.table().columns().into_iter().map(|(name, _)| name).collect::<Vec<_>>();
        println!("Columns {}", columns.join(", "));
        db.close().await;
        Ok(())
    }
}
