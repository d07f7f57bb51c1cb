use std::path::Path;

use chrono::Utc;
use indicatif::ProgressStyle;
use rand::distr::{Alphanumeric, SampleString};

/// 存储文件名中保留的原始文件名最大长度
const NAME_LIMIT: usize = 100;

/// 当前时间的毫秒时间戳
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// 生成形如 `20240102_030405` 的时间戳，用于文件名
pub fn generate_file_timestamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

/// 根据原始文件名生成图片目录中的唯一文件名
///
/// 文件名前加上时间戳和随机前缀，过长的文件名会被截断，`,+;` 替换为空格
pub fn storage_name(original: &Path) -> String {
    let stem = original.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let stem: String = stem.chars().take(NAME_LIMIT).collect();
    let name = match original.extension() {
        Some(ext) => format!("{stem}.{}", ext.to_string_lossy()),
        None => stem,
    };
    let prefix = Alphanumeric.sample_string(&mut rand::rng(), 8);
    let name = format!("{}_{}_{}", generate_file_timestamp(), prefix, name);
    name.replace([',', '+', ';'], " ")
}

/// 根据扩展名推断图片的 MIME 类型
pub fn mime_type(path: &Path) -> &'static str {
    let ext = path.extension().map(|s| s.to_string_lossy().to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

/// 文件名是否可以安全地拼接到图片目录下
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name().is_some_and(|n| n == name)
}

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .expect("invalid progress bar template")
        .progress_chars("#>-")
}
