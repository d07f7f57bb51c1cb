use std::path::{Path, PathBuf};

use log::{info, warn};

use super::{ImageSize, OpenAiClient, ServiceConfig};
use crate::error::Result;

/// 通过 OpenAI 图片生成接口生成图片，并下载到本地
#[derive(Debug, Clone)]
pub struct Generator {
    client: OpenAiClient,
    model: Option<String>,
}

impl Generator {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let key = config.openai_api_key()?.to_owned();
        Ok(Self {
            client: OpenAiClient::new(&config.openai_url, Some(key), config.timeout)?,
            model: config.openai_image_model.clone(),
        })
    }

    pub fn with_client(client: OpenAiClient, model: Option<String>) -> Self {
        Self { client, model }
    }

    /// 生成 `n` 张图片并下载到 `dir`，下载失败的图片会被跳过
    ///
    /// 每张图片下载到单独的子目录，避免同名文件互相覆盖
    pub async fn generate(
        &self,
        prompt: &str,
        n: usize,
        size: ImageSize,
        dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        info!("生成图片: {}", prompt);
        let urls = self.client.generate_images(self.model.as_deref(), prompt, n, size).await?;

        let mut paths = vec![];
        for (i, url) in urls.iter().enumerate() {
            let target = dir.join(i.to_string());
            tokio::fs::create_dir_all(&target).await?;
            match self.client.download(url, &target).await {
                Ok(path) => paths.push(path),
                Err(e) => warn!("下载图片 {} 失败: {}", url, e),
            }
        }
        Ok(paths)
    }
}
