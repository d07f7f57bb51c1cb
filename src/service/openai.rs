use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use super::{http_client, non_empty, post_json};
use crate::error::{Error, Result};
use crate::utils;

/// OpenAI 兼容接口客户端，支持 embeddings 和图片生成
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// 生成图片的尺寸
#[derive(clap::ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImageSize {
    /// 1024x1024
    #[default]
    Square,
    /// 1024x1792
    Portrait,
    /// 1792x1024
    Landscape,
}

impl ImageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1024x1024",
            Self::Portrait => "1024x1792",
            Self::Landscape => "1792x1024",
        }
    }
}

#[derive(Serialize)]
struct GenerationRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    prompt: &'a str,
    n: usize,
    size: &'static str,
    response_format: &'static str,
}

#[derive(Deserialize)]
struct GenerationResponse {
    data: Vec<GeneratedImage>,
}

#[derive(Deserialize)]
struct GeneratedImage {
    url: Option<String>,
}

impl OpenAiClient {
    /// `base_url` 形如 `https://api.openai.com/v1`
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.filter(|key| !key.is_empty()),
        })
    }

    /// 生成单条输入的向量，图片以 data URL 形式传入
    pub async fn embeddings(&self, model: &str, input: String) -> Result<Vec<f32>> {
        let request = EmbeddingsRequest { model, input: vec![input] };
        let url = format!("{}/embeddings", self.base_url);
        let response: EmbeddingsResponse =
            post_json(&self.client, &url, &request, self.api_key.as_deref()).await?;
        let embedding = response.data.into_iter().next().map(|data| data.embedding).ok_or_else(|| {
            Error::Upstream { status: 200, message: "响应中没有向量数据".to_owned() }
        })?;
        non_empty(200, embedding)
    }

    /// 生成图片，返回图片的下载地址
    ///
    /// 未指定模型时使用服务端的默认模型
    pub async fn generate_images(
        &self,
        model: Option<&str>,
        prompt: &str,
        n: usize,
        size: ImageSize,
    ) -> Result<Vec<String>> {
        let request =
            GenerationRequest { model, prompt, n, size: size.as_str(), response_format: "url" };
        let url = format!("{}/images/generations", self.base_url);
        let response: GenerationResponse =
            post_json(&self.client, &url, &request, self.api_key.as_deref()).await?;
        Ok(response.data.into_iter().filter_map(|image| image.url).collect())
    }

    /// 下载图片到 `dir`，文件名取自地址的最后一段
    pub async fn download(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        let name = Url::parse(url)
            .ok()
            .and_then(|url| url.path_segments()?.next_back().map(str::to_owned))
            .filter(|name| utils::is_plain_file_name(name))
            .unwrap_or_else(|| "generated.png".to_owned());

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Upstream { status: status.as_u16(), message });
        }
        let data = response.bytes().await?;

        let path = dir.join(name);
        debug!("下载 {} 到 {}", url, path.display());
        tokio::fs::write(&path, &data).await?;
        Ok(path)
    }
}
