use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use shared::domain::{ArrayData, ArrayId};

const ARRAY_COLUMNS: &str = "id, data, is_sorted, creation_date, update_date";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredArray {
    pub array_id: ArrayId,
    pub data: ArrayData,
    pub is_sorted: bool,
    pub creation_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_array(&self, data: &ArrayData, is_sorted: bool) -> Result<StoredArray> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "INSERT INTO arrays (data, is_sorted, creation_date, update_date)
             VALUES (?, ?, ?, ?)
             RETURNING {ARRAY_COLUMNS}"
        ))
        .bind(encode_data(data)?)
        .bind(is_sorted)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert array")?;
        stored_array_from_row(&row)
    }

    pub async fn load_array(&self, array_id: ArrayId) -> Result<Option<StoredArray>> {
        let row = sqlx::query(&format!("SELECT {ARRAY_COLUMNS} FROM arrays WHERE id = ?"))
            .bind(array_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(stored_array_from_row).transpose()
    }

    /// Returns up to `limit` arrays ordered by id, skipping the first `offset`.
    pub async fn list_arrays(&self, offset: i64, limit: i64) -> Result<Vec<StoredArray>> {
        let rows = sqlx::query(&format!(
            "SELECT {ARRAY_COLUMNS} FROM arrays ORDER BY id ASC LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(stored_array_from_row).collect()
    }

    pub async fn list_array_ids(&self) -> Result<Vec<ArrayId>> {
        let rows = sqlx::query("SELECT id FROM arrays ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| ArrayId(r.get::<i64, _>(0)))
            .collect())
    }

    pub async fn count_arrays(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM arrays")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Overwrites the fields that are `Some` and refreshes `update_date`.
    /// Returns `None` when no such array exists.
    pub async fn update_array(
        &self,
        array_id: ArrayId,
        data: Option<&ArrayData>,
        is_sorted: Option<bool>,
    ) -> Result<Option<StoredArray>> {
        let encoded = data.map(encode_data).transpose()?;
        let row = sqlx::query(&format!(
            "UPDATE arrays
             SET data = COALESCE(?, data),
                 is_sorted = COALESCE(?, is_sorted),
                 update_date = ?
             WHERE id = ?
             RETURNING {ARRAY_COLUMNS}"
        ))
        .bind(encoded)
        .bind(is_sorted)
        .bind(Utc::now())
        .bind(array_id.0)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to update array {}", array_id.0))?;
        row.as_ref().map(stored_array_from_row).transpose()
    }

    pub async fn delete_array(&self, array_id: ArrayId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM arrays WHERE id = ?")
            .bind(array_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn clear_arrays(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM arrays")
            .execute(&self.pool)
            .await
            .context("failed to clear arrays")?;
        debug!(removed = result.rows_affected(), "cleared arrays table");
        Ok(result.rows_affected())
    }
}

fn encode_data(data: &ArrayData) -> Result<String> {
    serde_json::to_string(data).context("failed to encode array data")
}

fn stored_array_from_row(row: &SqliteRow) -> Result<StoredArray> {
    let array_id = ArrayId(row.try_get::<i64, _>(0)?);
    let raw: String = row.try_get(1)?;
    let data = serde_json::from_str(&raw)
        .with_context(|| format!("array {} holds malformed data", array_id.0))?;
    Ok(StoredArray {
        array_id,
        data,
        is_sorted: row.try_get::<bool, _>(2)?,
        creation_date: row.try_get::<DateTime<Utc>, _>(3)?,
        update_date: row.try_get::<DateTime<Utc>, _>(4)?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
