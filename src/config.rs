use std::convert::Infallible;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;

use crate::cli::*;
use crate::db::TableSchema;
use crate::imdb::DEFAULT_TABLE;
use crate::service::{ImageProviderKind, ServiceConfig};

static CONF_DIR: LazyLock<ConfDir> = LazyLock::new(|| {
    let path = match ProjectDirs::from("", "imagen", "imagen") {
        Some(dirs) => dirs.config_dir().to_path_buf(),
        None => PathBuf::from(".imagen"),
    };
    ConfDir { path }
});

/// nomic-embed-text 的向量维度
const NOMIC_VECTOR_SIZE: usize = 768;
/// OpenAI text-embedding 模型的向量维度
const OPENAI_VECTOR_SIZE: usize = 1536;

#[derive(Parser, Debug, Clone)]
pub struct ProviderOptions {
    /// Ollama API 地址
    #[arg(long, env = "OLLAMA_BASE_URL", default_value = "http://localhost:11434/api")]
    pub ollama_url: String,
    /// 生成图片描述的 llava 模型，图片向量使用 llava 时也使用该模型
    #[arg(long, env = "IMAGEN_LLAVA_MODEL", default_value = "llava")]
    pub llava_model: String,
    /// 生成文本向量的 nomic 模型
    #[arg(long, env = "IMAGEN_NOMIC_MODEL", default_value = "nomic-embed-text")]
    pub nomic_model: String,
    /// 图片向量服务
    #[arg(long, env = "IMAGEN_IMAGE_PROVIDER", value_enum, default_value_t = ImageProviderKind::Clip)]
    pub image_provider: ImageProviderKind,
    /// CLIP 服务地址，需要兼容 OpenAI embeddings 接口
    #[arg(long, env = "IMAGEN_CLIP_URL", default_value = "http://localhost:8080/v1")]
    pub clip_url: String,
    /// CLIP 模型名称
    #[arg(long, env = "IMAGEN_CLIP_MODEL", default_value = "ViT-L/14")]
    pub clip_model: String,
    /// OpenAI API 地址
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub openai_url: String,
    #[arg(long, env = "OPENAI_API_KEY", default_value = "", hide_env_values = true)]
    pub openai_api_key: String,
    /// 设置后使用 OpenAI 生成文本向量
    #[arg(long, env = "OPENAI_EMBEDDINGS_MODEL")]
    pub openai_embeddings_model: Option<String>,
    /// 生成图片的 OpenAI 模型，未设置时使用服务端默认模型
    #[arg(long, env = "OPENAI_IMAGE_MODEL")]
    pub openai_image_model: Option<String>,
    /// 模型服务请求超时，单位为秒
    #[arg(long, value_name = "SECS", env = "IMAGEN_TIMEOUT", default_value_t = 120)]
    pub timeout: u64,
}

impl ProviderOptions {
    pub fn to_service_config(&self) -> ServiceConfig {
        ServiceConfig {
            ollama_url: self.ollama_url.clone(),
            llava_model: self.llava_model.clone(),
            nomic_model: self.nomic_model.clone(),
            image_provider: self.image_provider,
            clip_url: self.clip_url.clone(),
            clip_model: self.clip_model.clone(),
            openai_url: self.openai_url.clone(),
            openai_api_key: self.openai_api_key.clone(),
            openai_embeddings_model: self.openai_embeddings_model.clone(),
            openai_image_model: self.openai_image_model.clone(),
            timeout: Duration::from_secs(self.timeout),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "imagen", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// imagen 配置文件目录，数据库默认保存在这里
    #[arg(short, long, env = "IMAGEN_CONF_DIR", default_value_t = CONF_DIR.clone())]
    pub conf_dir: ConfDir,
    /// 图片目录，默认为配置目录下的 images
    #[arg(long, env = "IMAGEN_IMAGE_PATH")]
    pub image_dir: Option<PathBuf>,
    /// 图片表名
    #[arg(long, env = "IMAGEN_TABLE", default_value = DEFAULT_TABLE)]
    pub table: String,
    /// 图片向量维度
    #[arg(long, value_name = "N", default_value_t = 768)]
    pub image_vector_size: usize,
    /// 文本向量维度，默认根据文本向量服务推断
    #[arg(long, value_name = "N")]
    pub text_vector_size: Option<usize>,
    #[command(flatten)]
    pub provider: ProviderOptions,
}

impl Opts {
    /// 当前配置下图片表的向量维度
    pub fn schema(&self) -> TableSchema {
        let text_vector_size = self.text_vector_size.unwrap_or(
            match self.provider.openai_embeddings_model {
                Some(_) => OPENAI_VECTOR_SIZE,
                None => NOMIC_VECTOR_SIZE,
            },
        );
        TableSchema { image_vector_size: self.image_vector_size, text_vector_size }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 导入目录中的所有图片
    Init(InitCommand),
    /// 导入单张图片
    Add(AddCommand),
    /// 显示图片表的记录数量
    Count(CountCommand),
    /// 导出图片记录
    Export(ExportCommand),
    /// 同步图片目录和图片表，删除多余的文件和记录
    Clean(CleanCommand),
    /// 使用 OpenAI 生成图片并导入
    Generate(GenerateCommand),
    /// 以图片或文本搜索图片
    Search(SearchCommand),
    /// 启动 HTTP 服务
    Server(ServerCommand),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回数据库文件的路径
    pub fn database(&self) -> PathBuf {
        self.path.join("imagen.db")
    }

    /// 返回默认图片目录的路径
    pub fn images(&self) -> PathBuf {
        self.path.join("images")
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}

impl fmt::Display for ConfDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
}
