use std::sync::Arc;

use crate::Imagen;
use crate::cli::server::ServerCommand;
use crate::distance::Metric;
use crate::service::Services;

/// 应用状态
pub struct AppState {
    /// 图片库
    pub db: Imagen<Services>,
    /// 默认返回的结果数量
    pub limit: usize,
    /// 默认距离度量
    pub metric: Metric,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(db: Imagen<Services>, opts: ServerCommand) -> Arc<Self> {
        Arc::new(AppState { db, limit: opts.limit, metric: opts.metric })
    }
}
