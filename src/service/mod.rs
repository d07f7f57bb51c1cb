//! 外部模型服务：图片描述和向量嵌入
//!
//! 每种模态都有两个可互换的实现，启动时根据配置选择其中一个

mod generation;
mod ollama;
mod openai;

use std::path::Path;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::debug;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use self::generation::*;
pub use self::ollama::*;
pub use self::openai::*;
use crate::db::{TableSchema, VectorColumn};
use crate::error::{Error, Result};
use crate::utils;

/// 向量嵌入服务
///
/// 失败时必须返回错误，不能返回空向量或不完整的向量
pub trait Embedder: Send + Sync {
    fn embed_image(&self, path: &Path) -> impl Future<Output = Result<Vec<f32>>> + Send;

    fn embed_text(&self, text: &str) -> impl Future<Output = Result<Vec<f32>>> + Send;
}

/// 图片描述服务，没有可用描述时返回 `None`
pub trait Captioner: Send + Sync {
    fn describe(&self, path: &Path) -> impl Future<Output = Result<Option<String>>> + Send;
}

/// 图片向量服务
#[derive(Debug, Clone)]
pub enum ImageProvider {
    /// 通过 OpenAI 兼容接口提供的 CLIP 模型
    Clip { client: OpenAiClient, model: String },
    /// Ollama 上的 llava 模型
    Llava { client: OllamaClient, model: String },
}

/// 文本向量服务
#[derive(Debug, Clone)]
pub enum TextProvider {
    /// Ollama 上的 nomic-embed-text 模型
    Nomic { client: OllamaClient, model: String },
    /// OpenAI embeddings 接口
    OpenAi { client: OpenAiClient, model: String },
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageProviderKind {
    Clip,
    Llava,
}

/// 模型服务配置
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub ollama_url: String,
    pub llava_model: String,
    pub nomic_model: String,
    pub image_provider: ImageProviderKind,
    pub clip_url: String,
    pub clip_model: String,
    pub openai_url: String,
    pub openai_api_key: String,
    /// 设置后使用 OpenAI 生成文本向量
    pub openai_embeddings_model: Option<String>,
    /// 生成图片的模型，未设置时使用服务端默认模型
    pub openai_image_model: Option<String>,
    pub timeout: Duration,
}

impl ServiceConfig {
    /// 有效的 OpenAI API key
    pub fn openai_api_key(&self) -> Result<&str> {
        let key = self.openai_api_key.as_str();
        if key.is_empty() || key.contains('<') {
            return Err(Error::Config("未设置 OpenAI API key".to_owned()));
        }
        Ok(key)
    }
}

/// 运行时使用的模型服务组合
#[derive(Debug, Clone)]
pub struct Services {
    captioner: OllamaClient,
    caption_model: String,
    image: ImageProvider,
    text: TextProvider,
    schema: TableSchema,
}

impl Services {
    /// 根据配置选择服务实现
    pub fn new(config: &ServiceConfig, schema: TableSchema) -> Result<Self> {
        let ollama = OllamaClient::new(&config.ollama_url, config.timeout)?;

        let image = match config.image_provider {
            ImageProviderKind::Clip => ImageProvider::Clip {
                client: OpenAiClient::new(&config.clip_url, None, config.timeout)?,
                model: config.clip_model.clone(),
            },
            ImageProviderKind::Llava => {
                ImageProvider::Llava { client: ollama.clone(), model: config.llava_model.clone() }
            }
        };

        let text = match &config.openai_embeddings_model {
            Some(model) => TextProvider::OpenAi {
                client: OpenAiClient::new(
                    &config.openai_url,
                    Some(config.openai_api_key()?.to_owned()),
                    config.timeout,
                )?,
                model: model.clone(),
            },
            None => TextProvider::Nomic { client: ollama.clone(), model: config.nomic_model.clone() },
        };

        Ok(Self { captioner: ollama, caption_model: config.llava_model.clone(), image, text, schema })
    }
}

impl Embedder for Services {
    async fn embed_image(&self, path: &Path) -> Result<Vec<f32>> {
        let embedding = match &self.image {
            ImageProvider::Clip { client, model } => {
                let (mime, data) = encode_image(path).await?;
                client.embeddings(model, format!("data:{mime};base64,{data}")).await?
            }
            ImageProvider::Llava { client, model } => {
                let (_, data) = encode_image(path).await?;
                client.image_embeddings(model, data).await?
            }
        };
        debug!("图片向量维度: {}", embedding.len());
        self.schema.check(VectorColumn::Image, &embedding)?;
        Ok(embedding)
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = match &self.text {
            TextProvider::Nomic { client, model } => client.text_embeddings(model, text).await?,
            TextProvider::OpenAi { client, model } => client.embeddings(model, text.to_owned()).await?,
        };
        self.schema.check(VectorColumn::Text, &embedding)?;
        Ok(embedding)
    }
}

impl Captioner for Services {
    async fn describe(&self, path: &Path) -> Result<Option<String>> {
        let (_, data) = encode_image(path).await?;
        let description = self.captioner.describe(&self.caption_model, data).await?;
        Ok(Some(description).filter(|s| !s.trim().is_empty()))
    }
}

/// 读取图片并进行 base64 编码，返回 `(MIME 类型, 编码后的数据)`
pub async fn encode_image(path: &Path) -> Result<(&'static str, String)> {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::SourceNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    Ok((utils::mime_type(path), STANDARD.encode(data)))
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// 发送 JSON 请求，非成功状态码转换为 [`Error::Upstream`]
pub(crate) async fn post_json<B, T>(
    client: &Client,
    url: &str,
    body: &B,
    bearer: Option<&str>,
) -> Result<T>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let mut request = client.post(url).json(body);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }
    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(Error::Upstream { status: status.as_u16(), message: text });
    }
    serde_json::from_str(&text).map_err(|e| Error::Upstream {
        status: status.as_u16(),
        message: format!("无法解析响应: {e}"),
    })
}

/// 空向量视为上游错误
pub(crate) fn non_empty(status: u16, embedding: Vec<f32>) -> Result<Vec<f32>> {
    if embedding.is_empty() {
        return Err(Error::Upstream { status, message: "上游服务返回了空向量".to_owned() });
    }
    Ok(embedding)
}
