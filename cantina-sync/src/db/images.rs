//! Generated image persistence

use cantina_common::Result;
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;

use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Image row. `path` is a bare filename inside the asset directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub path: String,
    pub prompt: Option<String>,
    pub revised_prompt: Option<String>,
    /// `None` once the menu row is gone
    pub menu_date: Option<NaiveDate>,
}

/// Insert an image row
///
/// A duplicate `path` (or a second image for the same date) fails with a
/// unique violation, see `cantina_common::Error::is_unique_violation`.
pub async fn insert_image(pool: &SqlitePool, image: &ImageRecord) -> Result<()> {
    retry_on_lock("image insert", DEFAULT_MAX_LOCK_WAIT_MS, move || async move {
        sqlx::query(
            "INSERT INTO images (path, prompt, revised_prompt, menu_date) VALUES (?, ?, ?, ?)",
        )
        .bind(&image.path)
        .bind(&image.prompt)
        .bind(&image.revised_prompt)
        .bind(image.menu_date)
        .execute(pool)
        .await?;
        Ok(())
    })
    .await
}

/// Every path referenced by an image row
pub async fn referenced_paths(pool: &SqlitePool) -> Result<HashSet<String>> {
    let rows = sqlx::query("SELECT path FROM images").fetch_all(pool).await?;
    rows.iter()
        .map(|row| row.try_get::<String, _>("path").map_err(Into::into))
        .collect()
}

/// Image linked to `date`, if any
pub async fn load_image_for_date(pool: &SqlitePool, date: NaiveDate) -> Result<Option<ImageRecord>> {
    let row = sqlx::query(
        "SELECT path, prompt, revised_prompt, menu_date FROM images WHERE menu_date = ?",
    )
    .bind(date)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(ImageRecord {
            path: row.try_get("path")?,
            prompt: row.try_get("prompt")?,
            revised_prompt: row.try_get("revised_prompt")?,
            menu_date: row.try_get("menu_date")?,
        })),
        None => Ok(None),
    }
}
