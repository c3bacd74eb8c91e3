use std::{env, path::Path};

use anyhow::{bail, Context};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub bind_addr: String,
    pub database_url: String,
    pub bucket_count: usize,
    pub page_size: u32,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".into(),
            database_url: "sqlite://./data/arrays.db".into(),
            bucket_count: bucket_sort::DEFAULT_BUCKET_COUNT,
            page_size: server_api::DEFAULT_PAGE_SIZE,
            max_body_bytes: 8 * 1024 * 1024,
        }
    }
}

impl Settings {
    fn validate(&self) -> anyhow::Result<()> {
        if self.bucket_count == 0 {
            bail!("bucket_count must be at least 1");
        }
        if self.page_size == 0 {
            bail!("page_size must be at least 1");
        }
        if self.max_body_bytes == 0 {
            bail!("max_body_bytes must be greater than 0");
        }
        Ok(())
    }
}

pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new("server.toml"))
}

/// Layers defaults, the optional TOML file at `path`, `APP__*` environment
/// variables and finally the `SERVER_BIND` / `DATABASE_URL` aliases.
pub fn load_settings_from(path: &Path) -> anyhow::Result<Settings> {
    let defaults = Settings::default();

    let settings: Settings = Config::builder()
        .set_default("bind_addr", defaults.bind_addr)?
        .set_default("database_url", defaults.database_url)?
        .set_default("bucket_count", defaults.bucket_count as u64)?
        .set_default("page_size", u64::from(defaults.page_size))?
        .set_default("max_body_bytes", defaults.max_body_bytes as u64)?
        .add_source(File::new(&path.to_string_lossy(), FileFormat::Toml).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .set_override_option("bind_addr", env::var("SERVER_BIND").ok())?
        .set_override_option("database_url", env::var("DATABASE_URL").ok())?
        .build()
        .with_context(|| format!("failed to load settings from '{}'", path.display()))?
        .try_deserialize()
        .context("invalid server settings")?;

    settings.validate()?;
    Ok(settings)
}

/// Turns bare paths and `sqlite:` variants into a URL sqlx accepts.
/// Windows drive paths keep a single colon (`sqlite:C:/...`).
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite://") {
        return sqlite_url_for_path(path);
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        return sqlite_url_for_path(path);
    }

    if raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    sqlite_url_for_path(raw_database_url)
}

fn sqlite_url_for_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    if has_drive_prefix(&path) {
        format!("sqlite:{path}")
    } else {
        format!("sqlite://{path}")
    }
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
