mod add;
mod clean;
mod count;
mod export;
mod generate;
mod init;
mod search;
pub mod server;

pub use add::*;
pub use clean::*;
pub use count::*;
pub use export::*;
pub use generate::*;
pub use init::*;
pub use search::*;
pub use server::*;

use crate::config::Opts;
use crate::service::Services;
use crate::{Imagen, ImagenBuilder};

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// 按命令行配置打开图片库
async fn open_imagen(opts: &Opts) -> anyhow::Result<Imagen> {
    let db = ImagenBuilder::new(opts.conf_dir.clone())
        .image_dir(opts.image_dir.clone())
        .table(&opts.table)
        .schema(opts.schema())
        .open()
        .await?;
    Ok(db)
}

/// 打开图片库并连接模型服务
async fn open_with_services(opts: &Opts) -> anyhow::Result<Imagen<Services>> {
    let services = Services::new(&opts.provider.to_service_config(), opts.schema())?;
    Ok(open_imagen(opts).await?.with_services(services))
}
