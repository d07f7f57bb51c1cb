use std::time::Duration;

use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{http_client, non_empty, post_json};
use crate::error::Result;

/// 描述图片时使用的提示词
pub const DESCRIBE_PROMPT: &str = "What is in this picture?";

/// Ollama HTTP 接口客户端
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    images: Vec<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

impl OllamaClient {
    /// `base_url` 形如 `http://localhost:11434/api`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self { client: http_client(timeout)?, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    /// 使用多模态模型生成图片描述，`image` 为 base64 编码的图片
    pub async fn describe(&self, model: &str, image: String) -> Result<String> {
        let request =
            GenerateRequest { model, prompt: DESCRIBE_PROMPT, stream: false, images: vec![image] };
        let url = format!("{}/generate", self.base_url);
        let response: GenerateResponse = post_json(&self.client, &url, &request, None).await?;
        debug!("图片描述: {}", response.response);
        Ok(response.response)
    }

    /// 生成文本向量
    pub async fn text_embeddings(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingsRequest { model, prompt: text, images: None };
        self.embeddings(&request).await
    }

    /// 生成图片向量，`image` 为 base64 编码的图片
    pub async fn image_embeddings(&self, model: &str, image: String) -> Result<Vec<f32>> {
        let request = EmbeddingsRequest { model, prompt: DESCRIBE_PROMPT, images: Some(vec![image]) };
        self.embeddings(&request).await
    }

    async fn embeddings(&self, request: &EmbeddingsRequest<'_>) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);
        let response: EmbeddingsResponse = post_json(&self.client, &url, request, None).await?;
        non_empty(200, response.embedding)
    }
}
