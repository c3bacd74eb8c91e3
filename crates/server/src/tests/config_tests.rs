use super::{load_settings_from, normalize_database_url};

use std::{
    env, fs,
    time::{SystemTime, UNIX_EPOCH},
};

fn temp_root(label: &str) -> std::path::PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let root = env::temp_dir().join(format!("bucket_server_{label}_{suffix}"));
    fs::create_dir_all(&root).expect("temp root");
    root
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
}

#[test]
fn keeps_memory_and_full_urls() {
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
    assert_eq!(
        normalize_database_url("sqlite://./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(
        normalize_database_url("sqlite:data/test.db"),
        "sqlite://data/test.db"
    );
}

#[test]
fn blank_url_falls_back_to_default() {
    assert_eq!(normalize_database_url("  "), "sqlite://./data/arrays.db");
}

#[test]
fn keeps_windows_absolute_path_with_single_sqlite_colon() {
    assert_eq!(
        normalize_database_url("sqlite:C:\\Users\\alice\\test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
}

#[test]
fn normalizes_windows_plain_path_with_single_sqlite_colon() {
    assert_eq!(
        normalize_database_url("C:\\Users\\alice\\test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
}

#[test]
fn converts_sqlite_double_slash_windows_path() {
    assert_eq!(
        normalize_database_url("sqlite://C:/Users/alice/test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
}

#[test]
fn missing_settings_file_yields_defaults() {
    let root = temp_root("defaults");
    let settings = load_settings_from(&root.join("absent.toml")).expect("settings");
    assert_eq!(settings.bucket_count, 5);
    assert_eq!(settings.page_size, 50);
    fs::remove_dir_all(root).expect("cleanup");
}

#[test]
fn settings_file_overrides_defaults() {
    let root = temp_root("file");
    let path = root.join("server.toml");
    fs::write(&path, "bucket_count = 8\npage_size = 20\n").expect("write settings");

    let settings = load_settings_from(&path).expect("settings");
    assert_eq!(settings.bucket_count, 8);
    assert_eq!(settings.page_size, 20);

    fs::remove_dir_all(root).expect("cleanup");
}

#[test]
fn zero_bucket_count_is_rejected() {
    let root = temp_root("invalid");
    let path = root.join("server.toml");
    fs::write(&path, "bucket_count = 0\n").expect("write settings");

    let err = load_settings_from(&path).expect_err("invalid settings");
    assert!(err.to_string().contains("bucket_count"));

    fs::remove_dir_all(root).expect("cleanup");
}
