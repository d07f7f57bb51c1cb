use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use imagen::config::ConfDir;
use imagen::db::TableSchema;
use imagen::distance::Metric;
use imagen::ingest::{Converted, ImageScan, suffix_regex};
use imagen::service::{Captioner, Embedder, Generator, ImageSize, OpenAiClient};
use imagen::upsert::SaveOutcome;
use imagen::{Error, Imagen, ImagenBuilder, Result};
use rstest::*;
use tempfile::TempDir;

const SCHEMA: TableSchema = TableSchema { image_vector_size: 3, text_vector_size: 2 };

/// 图片文件的内容即为图片向量，如 `1 0 0`；内容为 `blank` 的图片没有描述
#[derive(Debug, Clone, Default)]
struct FakeServices {
    fail_text: bool,
}

async fn read_content(path: &Path) -> Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(_) => Err(Error::SourceNotFound(path.to_path_buf())),
    }
}

impl Embedder for FakeServices {
    async fn embed_image(&self, path: &Path) -> Result<Vec<f32>> {
        let content = read_content(path).await?;
        Ok(content.split_whitespace().filter_map(|s| s.parse().ok()).collect())
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail_text {
            return Err(Error::Upstream { status: 500, message: "boom".to_owned() });
        }
        Ok(vec![text.len() as f32, text.matches('1').count() as f32])
    }
}

impl Captioner for FakeServices {
    async fn describe(&self, path: &Path) -> Result<Option<String>> {
        let content = read_content(path).await?;
        if content.trim() == "blank" {
            return Ok(None);
        }
        Ok(Some(format!("picture {}", content.trim())))
    }
}

struct Fixture {
    dir: TempDir,
    db: Imagen<FakeServices>,
}

impl Fixture {
    fn source(&self, name: &str, content: &str) -> PathBuf {
        let dir = self.dir.path().join("source");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn stored_files(&self) -> usize {
        fs::read_dir(self.db.image_dir()).unwrap().count()
    }
}

async fn setup(services: FakeServices) -> Fixture {
    let dir = TempDir::new().unwrap();
    let db = ImagenBuilder::new(ConfDir::new(dir.path().join("conf")))
        .schema(SCHEMA)
        .open()
        .await
        .unwrap()
        .with_services(services);
    Fixture { dir, db }
}

#[fixture]
async fn fixture() -> Fixture {
    setup(FakeServices::default()).await
}

#[rstest]
#[tokio::test]
async fn save_and_search_image(#[future] fixture: Fixture) {
    let fixture = fixture.await;
    let cat = fixture.source("cat.png", "1 0 0");
    let dog = fixture.source("dog.png", "0 1 0");
    assert_eq!(fixture.db.save_image_from_path(&cat).await.unwrap().outcome, SaveOutcome::Inserted);
    assert_eq!(fixture.db.save_image_from_path(&dog).await.unwrap().outcome, SaveOutcome::Inserted);
    assert_eq!(fixture.db.count().await.unwrap(), 2);

    let query = fixture.source("query.jpg", "0.9 0.1 0");
    let result = fixture.db.image_search(&query, 1, Metric::L2).await.unwrap();
    assert_eq!(result.len(), 1);
    assert!(result[0].name.ends_with("_cat.png"), "{}", result[0].name);
    assert_eq!(result[0].description, "picture 1 0 0");
    assert!(fixture.db.image_dir().join(&result[0].name).is_file());
}

#[rstest]
#[tokio::test]
async fn save_twice_updates(#[future] fixture: Fixture) {
    let fixture = fixture.await;
    let cat = fixture.source("cat.png", "1 0 0");
    let copy = fixture.source("cat copy.png", "1 0 0");

    let first = fixture.db.save_image_from_path(&cat).await.unwrap();
    let second = fixture.db.save_image_from_path(&copy).await.unwrap();
    assert_eq!(second.outcome, SaveOutcome::Updated);
    assert_eq!(second.name, first.name);
    assert!(fixture.db.image_dir().join(&second.name).is_file());
    assert_eq!(fixture.db.count().await.unwrap(), 1);
    assert_eq!(fixture.stored_files(), 1);
}

#[rstest]
#[tokio::test]
async fn missing_description_writes_nothing(#[future] fixture: Fixture) {
    let fixture = fixture.await;
    let blank = fixture.source("blank.png", "blank");

    let err = fixture.db.save_image_from_path(&blank).await.unwrap_err();
    assert!(matches!(err, Error::DescriptionMissing(_)), "{err:?}");
    assert_eq!(fixture.db.count().await.unwrap(), 0);
    assert_eq!(fixture.stored_files(), 0);
}

#[rstest]
#[tokio::test]
async fn missing_source(#[future] fixture: Fixture) {
    let fixture = fixture.await;
    let err = fixture.db.save_image_from_path(Path::new("/no/such/image.png")).await.unwrap_err();
    assert!(matches!(err, Error::SourceNotFound(_)), "{err:?}");
}

#[rstest]
#[tokio::test]
async fn text_search_ranks_descriptions(#[future] fixture: Fixture) {
    let fixture = fixture.await;
    fixture.db.save_image_from_path(&fixture.source("a.png", "1 1 1")).await.unwrap();
    fixture.db.save_image_from_path(&fixture.source("b.png", "0 0 0")).await.unwrap();

    // "picture 1 1 1" 的文本向量为 [13, 3]
    let result = fixture.db.text_search("ab 1 1 1 xxxxx", 2, Metric::L2).await.unwrap();
    assert_eq!(result.len(), 2);
    assert!(result[0].name.ends_with("_a.png"));
    assert!(result[0].distance <= result[1].distance);
}

#[rstest]
#[tokio::test]
async fn combined_search_fuses(#[future] fixture: Fixture) {
    let fixture = fixture.await;
    for (name, content) in [("a.png", "1 0 0"), ("b.png", "0 1 0"), ("c.png", "0 0 1")] {
        fixture.db.save_image_from_path(&fixture.source(name, content)).await.unwrap();
    }

    let query = fixture.source("query.png", "1 0 0");
    let result = fixture.db.combined_search(&query, "picture 1 0 0", 2, Metric::L2).await.unwrap();
    assert_eq!(result.len(), 2);
    assert!(result[0].name.ends_with("_a.png"), "{}", result[0].name);
    assert_eq!(result[0].distance, Some(0.));
}

#[tokio::test]
async fn embedder_errors_propagate() {
    let fixture = setup(FakeServices { fail_text: true }).await;
    let query = fixture.source("query.png", "1 0 0");

    let err = fixture.db.text_search("cat", 5, Metric::L2).await.unwrap_err();
    assert!(matches!(err, Error::Upstream { status: 500, .. }), "{err:?}");

    let err = fixture.db.combined_search(&query, "cat", 5, Metric::L2).await.unwrap_err();
    assert!(matches!(err, Error::Upstream { .. }), "{err:?}");

    // 图片搜索不依赖文本向量
    assert!(fixture.db.image_search(&query, 5, Metric::L2).await.unwrap().is_empty());
}

#[tokio::test]
async fn wrong_dimension_is_rejected() {
    let fixture = setup(FakeServices::default()).await;
    let query = fixture.source("query.png", "1 0");
    let err = fixture.db.image_search(&query, 5, Metric::Cosine).await.unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2, .. }), "{err:?}");
}

#[rstest]
#[tokio::test]
async fn convert_directory(#[future] fixture: Fixture) {
    let fixture = fixture.await;
    fixture.source("a.png", "1 0 0");
    fixture.source("b.JPG", "blank");
    fixture.source("notes.txt", "0 0 1");

    let scan = ImageScan::new(&fixture.dir.path().join("source"), &suffix_regex("png,jpg").unwrap());
    assert_eq!(scan.len(), 2);

    let mut conversion = fixture.db.convert_dir(scan);
    match conversion.next().await {
        Some(Converted::Record(data)) => {
            assert!(data.name.ends_with("_a.png"));
            assert_eq!(data.image_embedding, vec![1., 0., 0.]);
        }
        other => panic!("unexpected {other:?}"),
    }
    match conversion.next().await {
        Some(Converted::Skipped { path, error }) => {
            assert!(path.ends_with("b.JPG"));
            assert!(matches!(error, Error::DescriptionMissing(_)));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(conversion.next().await.is_none());

    conversion.restart();
    assert!(matches!(conversion.next().await, Some(Converted::Record(_))));
}

#[rstest]
#[tokio::test]
async fn failed_save_removes_copy(#[future] fixture: Fixture) {
    let fixture = fixture.await;

    // 图片向量维度不对，转换成功但写入失败
    let short = fixture.source("short.png", "1 0");
    let err = fixture.db.save_image_from_path(&short).await.unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { .. }), "{err:?}");
    assert_eq!(fixture.stored_files(), 0);

    let cat = fixture.source("cat.png", "1 0 0");
    fixture.db.table().close().await;
    assert!(fixture.db.save_image_from_path(&cat).await.is_err());
    assert_eq!(fixture.stored_files(), 0);
}

#[rstest]
#[tokio::test]
async fn generated_images_are_saved(#[future] fixture: Fixture) {
    use axum::Json;
    use axum::routing::{get, post};
    use serde_json::json;

    let fixture = fixture.await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let url = format!("{base}/files/fox.png");
    let app = axum::Router::new()
        .route(
            "/v1/images/generations",
            post(move || async move { Json(json!({ "data": [{ "url": url }] })) }),
        )
        .route("/files/fox.png", get(|| async { "0 1 0" }));
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let client =
        OpenAiClient::new(&format!("{base}/v1"), Some("sk-test".to_owned()), Duration::from_secs(5))
            .unwrap();
    let generator = Generator::with_client(client, Some("dall-e-3".to_owned()));

    let saved = fixture.db.generate(&generator, "a fox", 1, ImageSize::Square).await.unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].outcome, SaveOutcome::Inserted);
    assert!(saved[0].name.ends_with("_fox.png"), "{}", saved[0].name);
    assert!(fixture.db.image_dir().join(&saved[0].name).is_file());

    let saved = fixture.db.generate(&generator, "a fox", 1, ImageSize::Square).await.unwrap();
    assert_eq!(saved[0].outcome, SaveOutcome::Updated);
    assert_eq!(fixture.db.count().await.unwrap(), 1);
    assert_eq!(fixture.stored_files(), 1);
}
