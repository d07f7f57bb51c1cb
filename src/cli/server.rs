use clap::Parser;
use log::info;
use tokio::net::TcpListener;

use crate::cli::{SubCommandExtend, open_with_services};
use crate::config::Opts;
use crate::distance::Metric;
use crate::search::DEFAULT_LIMIT;
use crate::server;

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    /// 监听地址
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub addr: String,
    /// 请求未指定数量时返回的结果数量
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,
    /// 请求未指定距离度量时使用的度量
    #[arg(long, value_enum, default_value_t = Metric::L2)]
    pub metric: Metric,
}

impl SubCommandExtend for ServerCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let db = open_with_services(opts).await?;

        // 创建应用状态
        let state = server::AppState::new(db, self.clone());

        // 创建应用
        let app = server::create_app(state);

        // 启动服务器
        info!("服务器启动：http://{}", &self.addr);
        let listener = TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
