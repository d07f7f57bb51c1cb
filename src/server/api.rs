use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path as UrlPath, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum_typed_multipart::{FieldData, TypedMultipart};
use log::info;
use tempfile::TempDir;

use super::error::{AppError, Result};
use super::state::AppState;
use super::types::*;
use crate::distance::Metric;
use crate::error::Error;
use crate::{metrics, utils};

/// 合并搜索未指定数量时返回的结果数量
const TEXT_IMAGE_LIMIT: usize = 5;

/// 把上传的文件写入临时目录，保留原始文件名以便推断图片格式
async fn save_upload(file: &FieldData<Bytes>) -> Result<(TempDir, PathBuf)> {
    let file_name = file
        .metadata
        .file_name
        .as_deref()
        .and_then(|name| Path::new(name).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_owned());
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(file_name);
    tokio::fs::write(&path, &file.contents).await?;
    Ok((dir, path))
}

fn parse_metric(metric: Option<&str>, default: Metric) -> Result<Metric> {
    match metric {
        Some(s) => Ok(s.parse()?),
        None => Ok(default),
    }
}

fn into_responses(images: Vec<crate::db::Image>) -> Json<Vec<SearchResponse>> {
    Json(images.into_iter().map(SearchResponse::from).collect())
}

/// 上传一张图片
#[utoipa::path(
    post,
    path = "/image",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = UploadResponse),
    )
)]
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    data: TypedMultipart<UploadRequest>,
) -> Result<Json<UploadResponse>> {
    let (_dir, path) = save_upload(&data.file).await?;
    let name = path.file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    info!("上传图片 {}", name);

    let image = state.db.ingestor().convert(&path).await?;
    let saved = state.db.save(image).await?;

    Ok(Json(UploadResponse { name, path: saved.name, output: saved.outcome }))
}

/// 获取图片目录中的图片
#[utoipa::path(
    get,
    path = "/image/{name}",
    params(("name" = String, Path, description = "图片名称")),
    responses(
        (status = 200, description = "图片内容", content_type = "application/octet-stream"),
        (status = 404, description = "图片不存在"),
    )
)]
pub async fn get_image_handler(
    State(state): State<Arc<AppState>>,
    UrlPath(name): UrlPath<String>,
) -> Result<impl IntoResponse> {
    if !utils::is_plain_file_name(&name) {
        return Err(AppError::bad_request(format!("无效的图片名称: {name}")));
    }
    let path = state.db.image_dir().join(&name);
    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::SourceNotFound(PathBuf::from(name)).into());
        }
        Err(e) => return Err(e.into()),
    };
    Ok(([(header::CONTENT_TYPE, utils::mime_type(&path))], data))
}

/// 以文搜图
#[utoipa::path(
    post,
    path = "/search/text",
    request_body = TextSearchRequest,
    responses(
        (status = 200, body = Vec<SearchResponse>),
    )
)]
pub async fn search_text_handler(
    State(state): State<Arc<AppState>>,
    Json(data): Json<TextSearchRequest>,
) -> Result<Json<Vec<SearchResponse>>> {
    let metric = parse_metric(data.metric.as_deref(), state.metric)?;
    let limit = data.limit.unwrap_or(state.limit);
    let result = state.db.text_search(&data.search, limit, metric).await?;
    Ok(into_responses(result))
}

/// 以图搜图
#[utoipa::path(
    post,
    path = "/search/image",
    request_body(content = ImageSearchForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = Vec<SearchResponse>),
    )
)]
pub async fn search_image_handler(
    State(state): State<Arc<AppState>>,
    data: TypedMultipart<ImageSearchRequest>,
) -> Result<Json<Vec<SearchResponse>>> {
    let metric = parse_metric(data.metric.as_deref(), state.metric)?;
    let limit = data.limit.unwrap_or(state.limit);
    let (_dir, path) = save_upload(&data.file).await?;
    let result = state.db.image_search(&path, limit, metric).await?;
    Ok(into_responses(result))
}

/// 同时以图片和文本搜索，合并两种结果
#[utoipa::path(
    post,
    path = "/search/text_image",
    request_body(content = TextImageSearchForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = Vec<SearchResponse>),
    )
)]
pub async fn search_text_image_handler(
    State(state): State<Arc<AppState>>,
    data: TypedMultipart<TextImageSearchRequest>,
) -> Result<Json<Vec<SearchResponse>>> {
    let metric = parse_metric(data.metric.as_deref(), state.metric)?;
    let limit = data.limit.unwrap_or(TEXT_IMAGE_LIMIT);
    let (_dir, path) = save_upload(&data.file).await?;
    let result = state.db.combined_search(&path, &data.search, limit, metric).await?;
    Ok(into_responses(result))
}

/// 获取图片表统计信息
#[utoipa::path(
    get,
    path = "/stats",
    responses(
        (status = 200, body = StatsResponse),
    )
)]
pub async fn stats_handler(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>> {
    let table = state.db.table();
    let columns = table
        .columns()
        .into_iter()
        .map(|(name, data_type)| ColumnInfo { name: name.to_owned(), data_type })
        .collect();
    Ok(Json(StatsResponse { table: table.name().to_owned(), count: table.count().await?, columns }))
}

/// Prometheus 指标
#[utoipa::path(
    get,
    path = "/metrics",
    responses(
        (status = 200, body = String, content_type = "text/plain"),
    )
)]
pub async fn metrics_handler() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], metrics::gather_text())
}
