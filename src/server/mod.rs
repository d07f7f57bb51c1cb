mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use self::error::AppError;
pub use self::state::*;
pub use self::types::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::upload_handler,
        api::get_image_handler,
        api::search_text_handler,
        api::search_image_handler,
        api::search_text_image_handler,
        api::stats_handler,
        api::metrics_handler,
    ),
    components(schemas(
        types::UploadForm,
        types::ImageSearchForm,
        types::TextImageSearchForm,
        types::TextSearchRequest,
        types::SearchResponse,
        types::UploadResponse,
        types::StatsResponse,
        types::ColumnInfo,
    ))
)]
pub struct ApiDoc;

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/image", post(api::upload_handler))
        .route("/image/{name}", get(api::get_image_handler))
        .route("/search/text", post(api::search_text_handler))
        .route("/search/image", post(api::search_image_handler))
        .route("/search/text_image", post(api::search_text_image_handler))
        .route("/stats", get(api::stats_handler))
        .route("/metrics", get(api::metrics_handler))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        // 上传限制：10M
        .layer(RequestBodyLimitLayer::new(1024 * 1024 * 10))
        .with_state(state)
}
