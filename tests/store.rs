use std::path::PathBuf;
use std::time::Duration;

use imagen::Error;
use imagen::db::{Filter, ImageData, ImageTable, TableSchema, VectorColumn};
use imagen::distance::Metric;
use imagen::upsert::{SaveOutcome, Saved, Upserter};
use rstest::*;
use tempfile::TempDir;

const SCHEMA: TableSchema = TableSchema { image_vector_size: 3, text_vector_size: 2 };

#[fixture]
fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("imagen.db")
}

async fn open(dir: &TempDir) -> ImageTable {
    ImageTable::open_or_create(db_path(dir), "tbl_image", SCHEMA).await.unwrap()
}

fn data(name: &str, image: [f32; 3], description: &str) -> ImageData {
    ImageData {
        name: name.to_owned(),
        description: description.to_owned(),
        image_embedding: image.to_vec(),
        text_embedding: vec![description.len() as f32, 1.],
        path: None,
    }
}

fn names(images: &[imagen::db::Image]) -> Vec<&str> {
    images.iter().map(|i| i.name.as_str()).collect()
}

#[rstest]
#[tokio::test]
async fn reopen_keeps_rows(temp_dir: TempDir) {
    let table = open(&temp_dir).await;
    let upserter = Upserter::new(table.clone(), temp_dir.path());
    upserter.save(data("a.png", [1., 2., 3.], "a cat")).await.unwrap();
    table.close().await;

    let table = open(&temp_dir).await;
    assert_eq!(table.count().await.unwrap(), 1);
    assert_eq!(table.get("a.png").await.unwrap().unwrap().description, "a cat");
}

#[rstest]
#[tokio::test]
async fn reopen_with_other_sizes_fails(temp_dir: TempDir) {
    open(&temp_dir).await.close().await;

    let schema = TableSchema { image_vector_size: 4, text_vector_size: 2 };
    let err = ImageTable::open_or_create(db_path(&temp_dir), "tbl_image", schema).await.unwrap_err();
    assert!(
        matches!(err, Error::SchemaMismatch { expected: (4, 2), found: (3, 2), .. }),
        "{err:?}"
    );
}

#[rstest]
#[case::space("tbl image")]
#[case::quote("tbl\"; DROP TABLE x; --")]
#[case::digit("1tbl")]
#[tokio::test]
async fn invalid_table_name(temp_dir: TempDir, #[case] name: &str) {
    let err = ImageTable::open_or_create(db_path(&temp_dir), name, SCHEMA).await.unwrap_err();
    assert!(matches!(err, Error::InvalidTableName(_)), "{err:?}");
}

#[rstest]
#[tokio::test]
async fn tables_are_independent(temp_dir: TempDir) {
    let first = open(&temp_dir).await;
    let other = ImageTable::open_or_create(db_path(&temp_dir), "tbl_other", SCHEMA).await.unwrap();
    first.insert(&data("a.png", [0., 0., 0.], "a").into_image(1, 1)).await.unwrap();
    assert_eq!(first.count().await.unwrap(), 1);
    assert_eq!(other.count().await.unwrap(), 0);
}

#[rstest]
#[tokio::test]
async fn search_orders_by_distance(temp_dir: TempDir) {
    let table = open(&temp_dir).await;
    for (name, v) in [("a", [0., 0., 0.]), ("b", [1., 0., 0.]), ("c", [3., 0., 0.])] {
        table.insert(&data(name, v, name).into_image(1, 1)).await.unwrap();
    }

    let result = table.search(&[0.9, 0., 0.], VectorColumn::Image, 2, Metric::L2).await.unwrap();
    assert_eq!(names(&result), ["b", "a"]);
    assert!((result[0].distance.unwrap() - 0.01).abs() < 1e-5);
    assert!((result[1].distance.unwrap() - 0.81).abs() < 1e-5);

    // b 和 c 方向相同，距离相等时保持插入顺序；零向量的余弦距离为 1
    let result = table.search(&[1., 0., 0.], VectorColumn::Image, 10, Metric::Cosine).await.unwrap();
    assert_eq!(names(&result), ["b", "c", "a"]);
    assert_eq!(result[2].distance, Some(1.));
}

#[rstest]
#[tokio::test]
async fn search_text_column(temp_dir: TempDir) {
    let table = open(&temp_dir).await;
    table.insert(&data("short", [0., 0., 1.], "cat").into_image(1, 1)).await.unwrap();
    table.insert(&data("long", [0., 1., 0.], "a very long description").into_image(1, 1)).await.unwrap();

    let result = table.search(&[3., 1.], VectorColumn::Text, 1, Metric::L2).await.unwrap();
    assert_eq!(names(&result), ["short"]);
}

#[rstest]
#[tokio::test]
async fn search_edge_cases(temp_dir: TempDir) {
    let table = open(&temp_dir).await;
    assert!(table.search(&[0., 0., 0.], VectorColumn::Image, 5, Metric::L2).await.unwrap().is_empty());

    table.insert(&data("a", [0., 0., 0.], "a").into_image(1, 1)).await.unwrap();
    assert!(table.search(&[0., 0., 0.], VectorColumn::Image, 0, Metric::L2).await.unwrap().is_empty());

    let err = table.search(&[0., 0.], VectorColumn::Image, 5, Metric::L2).await.unwrap_err();
    assert!(
        matches!(err, Error::DimensionMismatch { column: "image_vector", expected: 3, actual: 2 }),
        "{err:?}"
    );
}

#[rstest]
#[tokio::test]
async fn insert_checks_dimensions(temp_dir: TempDir) {
    let table = open(&temp_dir).await;
    let mut image = data("a", [0., 0., 0.], "a").into_image(1, 1);
    image.text_embedding = vec![1., 2., 3.];
    let err = table.insert(&image).await.unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { column: "text_vector", .. }), "{err:?}");
    assert_eq!(table.count().await.unwrap(), 0);
}

#[rstest]
#[tokio::test]
async fn insert_duplicate_name(temp_dir: TempDir) {
    let table = open(&temp_dir).await;
    table.insert(&data("a", [0., 0., 0.], "a").into_image(1, 1)).await.unwrap();
    let err = table.insert(&data("a", [1., 1., 1.], "b").into_image(1, 1)).await.unwrap_err();
    assert!(matches!(err, Error::DuplicateName(ref name) if name == "a"), "{err:?}");
}

#[rstest]
#[tokio::test]
async fn upsert_same_vector_updates(temp_dir: TempDir) {
    let table = open(&temp_dir).await;
    let upserter = Upserter::new(table.clone(), temp_dir.path());

    let saved = upserter.save(data("first.png", [1., 2., 3.], "old")).await.unwrap();
    assert_eq!(saved, Saved { name: "first.png".to_owned(), outcome: SaveOutcome::Inserted });
    let before = table.get("first.png").await.unwrap().unwrap();
    assert_eq!(before.created, before.updated);

    tokio::time::sleep(Duration::from_millis(20)).await;
    let saved = upserter.save(data("second.png", [1., 2., 3.], "new")).await.unwrap();
    assert_eq!(saved, Saved { name: "first.png".to_owned(), outcome: SaveOutcome::Updated });

    assert_eq!(table.count().await.unwrap(), 1);
    assert!(table.get("second.png").await.unwrap().is_none());
    let after = table.get("first.png").await.unwrap().unwrap();
    assert_eq!(after.description, "new");
    assert_eq!(after.text_embedding, vec![3., 1.]);
    assert_eq!(after.created, before.created);
    assert!(after.updated > before.updated);
}

#[rstest]
#[tokio::test]
async fn upsert_distinct_vectors_insert(temp_dir: TempDir) {
    let table = open(&temp_dir).await;
    let upserter = Upserter::new(table.clone(), temp_dir.path());
    upserter.save(data("a", [1., 2., 3.], "a")).await.unwrap();
    // 非常接近但不完全相等，仍然视为不同的图片
    let saved = upserter.save(data("b", [1., 2., 3.0001], "b")).await.unwrap();
    assert_eq!(saved.outcome, SaveOutcome::Inserted);
    assert_eq!(table.count().await.unwrap(), 2);
}

#[rstest]
#[tokio::test]
async fn upsert_removes_redundant_copy(temp_dir: TempDir) {
    let image_dir = temp_dir.path().join("images");
    std::fs::create_dir_all(&image_dir).unwrap();
    let table = open(&temp_dir).await;
    let upserter = Upserter::new(table.clone(), &image_dir);

    let first = image_dir.join("first.png");
    let second = image_dir.join("second.png");
    std::fs::write(&first, "x").unwrap();
    std::fs::write(&second, "x").unwrap();

    let mut image = data("first.png", [1., 2., 3.], "a");
    image.path = Some(first.clone());
    upserter.save(image).await.unwrap();

    let mut image = data("second.png", [1., 2., 3.], "a");
    image.path = Some(second.clone());
    upserter.save(image).await.unwrap();

    assert!(first.exists());
    assert!(!second.exists());
}

#[rstest]
#[tokio::test]
async fn upsert_replaces_missing_file(temp_dir: TempDir) {
    let image_dir = temp_dir.path().join("images");
    std::fs::create_dir_all(&image_dir).unwrap();
    let table = open(&temp_dir).await;
    let upserter = Upserter::new(table.clone(), &image_dir);

    upserter.save(data("first.png", [1., 2., 3.], "a")).await.unwrap();

    let second = image_dir.join("second.png");
    std::fs::write(&second, "x").unwrap();
    let mut image = data("second.png", [1., 2., 3.], "a");
    image.path = Some(second.clone());
    upserter.save(image).await.unwrap();

    assert!(image_dir.join("first.png").exists());
    assert!(!second.exists());
}

#[rstest]
#[tokio::test]
async fn filters_escape_quotes_and_wildcards(temp_dir: TempDir) {
    let table = open(&temp_dir).await;
    table.insert(&data("it's.png", [0., 0., 0.], "100% cat").into_image(1, 1)).await.unwrap();
    table.insert(&data("b.png", [1., 0., 0.], "1000 cats").into_image(1, 1)).await.unwrap();

    assert!(table.get("it's.png").await.unwrap().is_some());

    let rows = table.select(Some(&Filter::DescriptionContains("100%")), None).await.unwrap();
    assert_eq!(names(&rows), ["it's.png"]);

    let rows = table.select(Some(&Filter::DescriptionContains("cat")), Some(1)).await.unwrap();
    assert_eq!(names(&rows), ["it's.png"]);

    assert_eq!(table.delete("it's.png").await.unwrap(), 1);
    assert_eq!(table.delete("it's.png").await.unwrap(), 0);
    assert_eq!(table.count().await.unwrap(), 1);
}

#[rstest]
#[tokio::test]
async fn upsert_keeps_quoted_description(temp_dir: TempDir) {
    let table = open(&temp_dir).await;
    let upserter = Upserter::new(table.clone(), temp_dir.path());
    upserter.save(data("it's.png", [1., 2., 3.], "plain")).await.unwrap();

    let description = "a cat's toy, 100% 'wool'; DROP TABLE tbl_image; --";
    let saved = upserter.save(data("copy.png", [1., 2., 3.], description)).await.unwrap();
    assert_eq!(saved.name, "it's.png");
    assert_eq!(saved.outcome, SaveOutcome::Updated);

    let row = table.get("it's.png").await.unwrap().unwrap();
    assert_eq!(row.description, description);
    assert_eq!(table.count().await.unwrap(), 1);
}

#[rstest]
#[tokio::test]
async fn concurrent_upserts_insert_once(temp_dir: TempDir) {
    let table = open(&temp_dir).await;
    let upserter = Upserter::new(table.clone(), temp_dir.path());
    let (a, b) = (upserter.clone(), upserter.clone());

    let (ra, rb, rc) = tokio::join!(
        a.save(data("a.png", [4., 5., 6.], "a")),
        b.save(data("b.png", [4., 5., 6.], "b")),
        upserter.save(data("c.png", [4., 5., 6.], "c")),
    );
    let mut outcomes = [ra.unwrap().outcome, rb.unwrap().outcome, rc.unwrap().outcome]
        .map(|o| o.as_str());
    outcomes.sort();
    assert_eq!(outcomes, ["inserted", "updated", "updated"]);
    assert_eq!(table.count().await.unwrap(), 1);
}

#[rstest]
#[tokio::test]
async fn upsert_finds_exact_match_behind_underflow(temp_dir: TempDir) {
    let table = open(&temp_dir).await;
    let upserter = Upserter::new(table.clone(), temp_dir.path());

    // 与零向量的平方距离下溢为 0，但不是同一张图片
    let tiny = data("tiny.png", [1e-30, 0., 0.], "tiny");
    assert_eq!(upserter.save(tiny).await.unwrap().outcome, SaveOutcome::Inserted);
    let zero = data("zero.png", [0., 0., 0.], "zero");
    assert_eq!(upserter.save(zero).await.unwrap().outcome, SaveOutcome::Inserted);

    let saved = upserter.save(data("again.png", [0., 0., 0.], "again")).await.unwrap();
    assert_eq!(saved, Saved { name: "zero.png".to_owned(), outcome: SaveOutcome::Updated });
    assert_eq!(table.count().await.unwrap(), 2);
    assert_eq!(table.get("tiny.png").await.unwrap().unwrap().description, "tiny");
}

#[rstest]
#[tokio::test]
async fn select_with_huge_limit(temp_dir: TempDir) {
    let table = open(&temp_dir).await;
    table.insert(&data("a", [0., 0., 0.], "a").into_image(1, 1)).await.unwrap();
    let rows = table.select(None, Some(usize::MAX)).await.unwrap();
    assert_eq!(names(&rows), ["a"]);
}
