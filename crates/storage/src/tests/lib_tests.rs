use super::*;

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("bucket_storage_test_{suffix}"));
    let db_path = temp_root.join("nested").join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );

    std::fs::remove_dir_all(temp_root).expect("cleanup");
}

#[tokio::test]
async fn creates_and_loads_array() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let created = storage
        .create_array(&ArrayData::Integers(vec![3, 1, 2]), false)
        .await
        .expect("create");
    assert!(created.array_id.0 > 0);
    assert!(!created.is_sorted);
    assert_eq!(created.creation_date, created.update_date);

    let loaded = storage
        .load_array(created.array_id)
        .await
        .expect("load")
        .expect("some array");
    assert_eq!(loaded.data, ArrayData::Integers(vec![3, 1, 2]));
    assert_eq!(loaded.creation_date, created.creation_date);
}

#[tokio::test]
async fn float_data_survives_storage() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let created = storage
        .create_array(&ArrayData::from(vec![0.5, -2.25]), true)
        .await
        .expect("create");
    let loaded = storage
        .load_array(created.array_id)
        .await
        .expect("load")
        .expect("some array");
    assert_eq!(loaded.data, ArrayData::from(vec![0.5, -2.25]));
    assert!(loaded.is_sorted);
}

#[tokio::test]
async fn missing_array_loads_as_none() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    assert!(storage.load_array(ArrayId(404)).await.expect("load").is_none());
    assert!(storage
        .update_array(ArrayId(404), None, Some(true))
        .await
        .expect("update")
        .is_none());
    assert!(!storage.delete_array(ArrayId(404)).await.expect("delete"));
}

#[tokio::test]
async fn update_keeps_omitted_fields() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let created = storage
        .create_array(&ArrayData::Integers(vec![2, 1]), false)
        .await
        .expect("create");

    let flagged = storage
        .update_array(created.array_id, None, Some(true))
        .await
        .expect("update")
        .expect("exists");
    assert_eq!(flagged.data, ArrayData::Integers(vec![2, 1]));
    assert!(flagged.is_sorted);
    assert!(flagged.update_date >= created.update_date);
    assert_eq!(flagged.creation_date, created.creation_date);

    let replaced = storage
        .update_array(created.array_id, Some(&ArrayData::Integers(vec![9])), None)
        .await
        .expect("update")
        .expect("exists");
    assert_eq!(replaced.data, ArrayData::Integers(vec![9]));
    assert!(replaced.is_sorted);
}

#[tokio::test]
async fn lists_arrays_in_id_order_with_offset() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let mut ids = Vec::new();
    for i in 0..5 {
        let created = storage
            .create_array(&ArrayData::Integers(vec![i]), false)
            .await
            .expect("create");
        ids.push(created.array_id);
    }

    assert_eq!(storage.count_arrays().await.expect("count"), 5);

    let page = storage.list_arrays(2, 2).await.expect("list");
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].array_id, ids[2]);
    assert_eq!(page[1].array_id, ids[3]);

    let tail = storage.list_arrays(4, 2).await.expect("list");
    assert_eq!(tail.len(), 1);
    assert_eq!(storage.list_array_ids().await.expect("ids"), ids);
}

#[tokio::test]
async fn delete_and_clear_remove_rows() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let first = storage
        .create_array(&ArrayData::Integers(vec![1]), false)
        .await
        .expect("create");
    for _ in 0..3 {
        storage
            .create_array(&ArrayData::Integers(vec![5, 4]), false)
            .await
            .expect("create");
    }

    assert!(storage.delete_array(first.array_id).await.expect("delete"));
    assert!(storage.load_array(first.array_id).await.expect("load").is_none());

    assert_eq!(storage.clear_arrays().await.expect("clear"), 3);
    assert_eq!(storage.count_arrays().await.expect("count"), 0);
}

#[test]
fn memory_urls_have_no_path() {
    assert!(sqlite_path("sqlite::memory:").is_none());
    assert_eq!(
        sqlite_path("sqlite://./data/arrays.db?mode=rwc"),
        Some(PathBuf::from("./data/arrays.db"))
    );
}
