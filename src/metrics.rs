use std::sync::LazyLock;

use prometheus::*;

static METRIC_SEARCH_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("imagen_search_count", "count of knn searches", &["modality", "metric"])
        .unwrap()
});

static METRIC_SEARCH_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "imagen_search_duration",
        "duration of the knn search in seconds, embedding included",
        &["modality"]
    )
    .unwrap()
});

static METRIC_UPSERT_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("imagen_upsert_count", "count of saved images", &["outcome"]).unwrap()
});

/// 记录一次搜索
pub fn inc_search(modality: &str, metric: &str, duration: f32) {
    METRIC_SEARCH_COUNT.with_label_values(&[modality, metric]).inc();
    METRIC_SEARCH_DURATION.with_label_values(&[modality]).observe(duration as f64);
}

/// 记录一次保存，`outcome` 为 `inserted` 或 `updated`
pub fn inc_upsert(outcome: &str) {
    METRIC_UPSERT_COUNT.with_label_values(&[outcome]).inc();
}

/// 以 Prometheus 文本格式导出所有指标
pub fn gather_text() -> String {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&gather(), &mut buffer) {
        log::error!("导出指标失败: {e}");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
