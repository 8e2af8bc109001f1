use kanban_core::{Card, Collection, Column, DocumentStore, StoreError};
use serde_json::Value;
use std::path::Path;

fn temp_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect()
}

#[tokio::test]
async fn load_reports_missing_collection_as_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = DocumentStore::new(dir.path());

    let err = store.load::<Vec<Card>>(Collection::Cards).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::NotFound { collection: Collection::Cards, ref path } if path == &dir.path().join("cards.json")
    ));
    assert!(!store.exists(Collection::Cards).await.unwrap());
}

#[tokio::test]
async fn load_reports_unparseable_content_as_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("columns.json"), "[{\"id\": \"col-a\",").unwrap();
    let store = DocumentStore::new(dir.path());

    let err = store
        .load::<Vec<Column>>(Collection::Columns)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Corrupt {
            collection: Collection::Columns,
            ..
        }
    ));
}

#[tokio::test]
async fn save_replaces_content_and_leaves_no_temp_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = DocumentStore::new(dir.path());

    let first = vec![Card::new("1", "first", "col-a")];
    store.save(Collection::Cards, &first).await.unwrap();
    let second = vec![Card::new("1", "first", "col-a"), Card::new("2", "second", "col-b")];
    store.save(Collection::Cards, &second).await.unwrap();

    let loaded: Vec<Card> = store.load(Collection::Cards).await.unwrap();
    assert_eq!(loaded, second);
    assert!(temp_files(dir.path()).is_empty());
}

#[tokio::test]
async fn saved_file_is_pretty_printed_json_array() {
    let dir = tempfile::tempdir().unwrap();
    let store = DocumentStore::new(dir.path());

    store
        .save(Collection::Columns, &vec![Column::new("col-a", "A")])
        .await
        .unwrap();

    let raw = std::fs::read_to_string(dir.path().join("columns.json")).unwrap();
    assert!(raw.contains('\n'));
    let parsed: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed[0]["id"], "col-a");
    assert_eq!(parsed[0]["title"], "A");
}

#[tokio::test]
async fn staged_write_without_commit_keeps_previous_content() {
    let dir = tempfile::tempdir().unwrap();
    let store = DocumentStore::new(dir.path());
    let original = vec![Card::new("1", "kept", "col-a")];
    store.save(Collection::Cards, &original).await.unwrap();

    // Simulates a crash between writing the temp file and the rename.
    let staged = store
        .stage(Collection::Cards, &vec![Card::new("9", "lost", "col-z")])
        .await
        .unwrap();
    assert!(staged.temp_path().exists());
    assert_eq!(staged.final_path(), dir.path().join("cards.json"));
    drop(staged);

    let loaded: Vec<Card> = store.load(Collection::Cards).await.unwrap();
    assert_eq!(loaded, original);
}

#[tokio::test]
async fn committed_stage_becomes_visible() {
    let dir = tempfile::tempdir().unwrap();
    let store = DocumentStore::new(dir.path());
    let cards = vec![Card::new("3", "staged", "col-a")];

    let staged = store.stage(Collection::Cards, &cards).await.unwrap();
    let temp_path = staged.temp_path().to_path_buf();
    staged.commit().await.unwrap();

    assert!(!temp_path.exists());
    let loaded: Vec<Card> = store.load(Collection::Cards).await.unwrap();
    assert_eq!(loaded, cards);
}

#[tokio::test]
async fn unknown_card_fields_survive_a_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("cards.json"),
        r#"[{"id": 7, "title": "legacy", "columnId": "col-a", "estimate": 3}]"#,
    )
    .unwrap();
    let store = DocumentStore::new(dir.path());

    let cards: Vec<Card> = store.load(Collection::Cards).await.unwrap();
    assert_eq!(cards[0].id, "7");
    store.save(Collection::Cards, &cards).await.unwrap();

    let raw: Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("cards.json")).unwrap())
            .unwrap();
    assert_eq!(raw[0]["estimate"], 3);
    assert_eq!(raw[0]["id"], "7");
}
