//! Menu item persistence
//!
//! `day`, `food_name` and `week_number` come from the upstream feed and are
//! frozen once `manual` is set. Derived fields (`corrected_food_name`,
//! `food_description`, `food_contents`) are only ever written while NULL.

use cantina_common::{Error, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::db::images::ImageRecord;
use crate::feed::FeedEntry;
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Menu item row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub date: NaiveDate,
    pub day: String,
    pub food_name: Option<String>,
    pub corrected_food_name: Option<String>,
    pub food_description: Option<String>,
    /// `Some(vec![])` means tagged with no matching category
    pub food_contents: Option<Vec<String>>,
    pub week_number: i64,
    pub manual: bool,
}

/// Menu item waiting for a derived field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingItem {
    pub date: NaiveDate,
    /// Dish name to send to the generation provider
    pub subject: String,
}

/// Result of reconciling one upstream day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
    /// Row is manual; upstream values were ignored
    ManualProtected,
}

/// Operator edit. `None` fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualEdit {
    pub day: Option<String>,
    pub food_name: Option<String>,
    pub week_number: Option<i64>,
    pub corrected_food_name: Option<String>,
    pub food_description: Option<String>,
    pub food_contents: Option<Vec<String>>,
}

fn encode_contents(contents: &[String]) -> Result<String> {
    serde_json::to_string(contents)
        .map_err(|e| Error::Internal(format!("Failed to serialize food contents: {}", e)))
}

fn decode_contents(date: NaiveDate, raw: Option<String>) -> Option<Vec<String>> {
    let raw = raw?;
    match serde_json::from_str(&raw) {
        Ok(contents) => Some(contents),
        Err(e) => {
            tracing::warn!(date = %date, error = %e, "Stored food contents are not a JSON list");
            None
        }
    }
}

pub(crate) fn menu_item_from_row(row: &SqliteRow) -> Result<MenuItem> {
    let date: NaiveDate = row.try_get("date")?;
    Ok(MenuItem {
        date,
        day: row.try_get("day")?,
        food_name: row.try_get("food_name")?,
        corrected_food_name: row.try_get("corrected_food_name")?,
        food_description: row.try_get("food_description")?,
        food_contents: decode_contents(date, row.try_get("food_contents")?),
        week_number: row.try_get("week_number")?,
        manual: row.try_get("manual")?,
    })
}

/// Load one menu item by date
pub async fn load_menu_item(pool: &SqlitePool, date: NaiveDate) -> Result<Option<MenuItem>> {
    let row = sqlx::query(
        r#"
        SELECT date, day, food_name, corrected_food_name, food_description,
               food_contents, week_number, manual
        FROM menus
        WHERE date = ?
        "#,
    )
    .bind(date)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(menu_item_from_row).transpose()
}

/// Load all menu items, oldest first
pub async fn load_all(pool: &SqlitePool) -> Result<Vec<MenuItem>> {
    let rows = sqlx::query(
        r#"
        SELECT date, day, food_name, corrected_food_name, food_description,
               food_contents, week_number, manual
        FROM menus
        ORDER BY date ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(menu_item_from_row).collect()
}

/// Load items dated `from` or later with their image, oldest first
pub async fn load_upcoming(
    pool: &SqlitePool,
    from: NaiveDate,
) -> Result<Vec<(MenuItem, Option<ImageRecord>)>> {
    let rows = sqlx::query(
        r#"
        SELECT menus.date AS date, menus.day AS day, menus.food_name AS food_name,
               menus.corrected_food_name AS corrected_food_name,
               menus.food_description AS food_description,
               menus.food_contents AS food_contents, menus.week_number AS week_number,
               menus.manual AS manual, images.path AS path, images.prompt AS prompt,
               images.revised_prompt AS revised_prompt
        FROM menus
        LEFT JOIN images ON images.menu_date = menus.date
        WHERE menus.date >= ?
        ORDER BY menus.date ASC
        "#,
    )
    .bind(from)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let item = menu_item_from_row(row)?;
            let path: Option<String> = row.try_get("path")?;
            let image = match path {
                Some(path) => Some(ImageRecord {
                    path,
                    prompt: row.try_get("prompt")?,
                    revised_prompt: row.try_get("revised_prompt")?,
                    menu_date: Some(item.date),
                }),
                None => None,
            };
            Ok((item, image))
        })
        .collect()
}

async fn upsert_once(pool: &SqlitePool, entry: &FeedEntry) -> Result<UpsertOutcome> {
    let mut tx = pool.begin().await?;

    let existing = sqlx::query(
        "SELECT day, food_name, week_number, manual FROM menus WHERE date = ?",
    )
    .bind(entry.date)
    .fetch_optional(&mut *tx)
    .await?;

    let outcome = match existing {
        None => {
            sqlx::query(
                "INSERT INTO menus (date, day, food_name, week_number) VALUES (?, ?, ?, ?)",
            )
            .bind(entry.date)
            .bind(&entry.day)
            .bind(&entry.food_name)
            .bind(entry.week_number)
            .execute(&mut *tx)
            .await?;
            UpsertOutcome::Inserted
        }
        Some(row) => {
            let manual: bool = row.try_get("manual")?;
            let day: String = row.try_get("day")?;
            let food_name: Option<String> = row.try_get("food_name")?;
            let week_number: i64 = row.try_get("week_number")?;

            if manual {
                UpsertOutcome::ManualProtected
            } else if day == entry.day
                && food_name == entry.food_name
                && week_number == entry.week_number
            {
                UpsertOutcome::Unchanged
            } else {
                sqlx::query(
                    r#"
                    UPDATE menus SET day = ?, food_name = ?, week_number = ?
                    WHERE date = ? AND manual = 0
                    "#,
                )
                .bind(&entry.day)
                .bind(&entry.food_name)
                .bind(entry.week_number)
                .bind(entry.date)
                .execute(&mut *tx)
                .await?;
                UpsertOutcome::Updated
            }
        }
    };

    tx.commit().await?;
    Ok(outcome)
}

/// Merge one upstream day into the store
///
/// Inserts an absent date. For an existing non-manual row, refreshes `day`,
/// `food_name` and `week_number`. Manual rows are left untouched, and `manual`
/// itself is never written here.
pub async fn upsert_from_feed(pool: &SqlitePool, entry: &FeedEntry) -> Result<UpsertOutcome> {
    retry_on_lock("menu upsert", DEFAULT_MAX_LOCK_WAIT_MS, || upsert_once(pool, entry)).await
}

async fn pending(pool: &SqlitePool, sql: &str) -> Result<Vec<PendingItem>> {
    let rows = sqlx::query(sql).fetch_all(pool).await?;
    rows.iter()
        .map(|row| {
            Ok(PendingItem {
                date: row.try_get("date")?,
                subject: row.try_get("subject")?,
            })
        })
        .collect()
}

/// Items with no content tags yet
pub async fn items_missing_contents(pool: &SqlitePool) -> Result<Vec<PendingItem>> {
    pending(
        pool,
        r#"
        SELECT date, food_name AS subject FROM menus
        WHERE food_contents IS NULL AND food_name IS NOT NULL
        ORDER BY date ASC
        "#,
    )
    .await
}

/// Items with no corrected name yet
pub async fn items_missing_corrected_name(pool: &SqlitePool) -> Result<Vec<PendingItem>> {
    pending(
        pool,
        r#"
        SELECT date, food_name AS subject FROM menus
        WHERE corrected_food_name IS NULL AND food_name IS NOT NULL
        ORDER BY date ASC
        "#,
    )
    .await
}

/// Items with no description yet. The subject prefers the corrected name.
pub async fn items_missing_description(pool: &SqlitePool) -> Result<Vec<PendingItem>> {
    pending(
        pool,
        r#"
        SELECT date, COALESCE(corrected_food_name, food_name) AS subject FROM menus
        WHERE food_description IS NULL
          AND COALESCE(corrected_food_name, food_name) IS NOT NULL
        ORDER BY date ASC
        "#,
    )
    .await
}

/// Items with no linked image row
pub async fn items_without_image(pool: &SqlitePool) -> Result<Vec<PendingItem>> {
    pending(
        pool,
        r#"
        SELECT menus.date AS date, menus.food_name AS subject FROM menus
        LEFT JOIN images ON images.menu_date = menus.date
        WHERE images.menu_date IS NULL AND menus.food_name IS NOT NULL
        ORDER BY menus.date ASC
        "#,
    )
    .await
}

/// Store content tags if none are stored yet. Returns false if already set.
pub async fn set_food_contents(
    pool: &SqlitePool,
    date: NaiveDate,
    contents: &[String],
) -> Result<bool> {
    let encoded = encode_contents(contents)?;
    let result = sqlx::query(
        "UPDATE menus SET food_contents = ? WHERE date = ? AND food_contents IS NULL",
    )
    .bind(encoded)
    .bind(date)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Store the corrected name if none is stored yet
pub async fn set_corrected_name(pool: &SqlitePool, date: NaiveDate, name: &str) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE menus SET corrected_food_name = ? WHERE date = ? AND corrected_food_name IS NULL",
    )
    .bind(name)
    .bind(date)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Store the description if none is stored yet
pub async fn set_description(
    pool: &SqlitePool,
    date: NaiveDate,
    description: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE menus SET food_description = ? WHERE date = ? AND food_description IS NULL",
    )
    .bind(description)
    .bind(date)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Apply an operator edit and mark the row manual
///
/// An absent date is created when the edit carries `day` and `week_number`;
/// otherwise `Error::NotFound`.
pub async fn apply_manual_edit(
    pool: &SqlitePool,
    date: NaiveDate,
    edit: &ManualEdit,
) -> Result<MenuItem> {
    let contents = edit
        .food_contents
        .as_deref()
        .map(encode_contents)
        .transpose()?;

    let mut tx = pool.begin().await?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM menus WHERE date = ?")
        .bind(date)
        .fetch_optional(&mut *tx)
        .await?;

    if exists.is_some() {
        sqlx::query(
            r#"
            UPDATE menus SET
                day = COALESCE(?, day),
                food_name = COALESCE(?, food_name),
                week_number = COALESCE(?, week_number),
                corrected_food_name = COALESCE(?, corrected_food_name),
                food_description = COALESCE(?, food_description),
                food_contents = COALESCE(?, food_contents),
                manual = 1
            WHERE date = ?
            "#,
        )
        .bind(&edit.day)
        .bind(&edit.food_name)
        .bind(edit.week_number)
        .bind(&edit.corrected_food_name)
        .bind(&edit.food_description)
        .bind(&contents)
        .bind(date)
        .execute(&mut *tx)
        .await?;
    } else {
        let (Some(day), Some(week_number)) = (&edit.day, edit.week_number) else {
            return Err(Error::NotFound(format!(
                "No menu for {}; day and weekNumber are required to create it",
                date
            )));
        };

        sqlx::query(
            r#"
            INSERT INTO menus (
                date, day, food_name, week_number, corrected_food_name,
                food_description, food_contents, manual
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 1)
            "#,
        )
        .bind(date)
        .bind(day)
        .bind(&edit.food_name)
        .bind(week_number)
        .bind(&edit.corrected_food_name)
        .bind(&edit.food_description)
        .bind(&contents)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    load_menu_item(pool, date)
        .await?
        .ok_or_else(|| Error::Internal(format!("Menu {} vanished after edit", date)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cantina_common::db::init_memory_database;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
    }

    fn entry(day: u32, name: Option<&str>) -> FeedEntry {
        FeedEntry {
            date: date(day),
            day: "Mandag".to_string(),
            week_number: 16,
            food_name: name.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_upsert_outcomes() {
        let pool = init_memory_database().await.unwrap();

        let first = upsert_from_feed(&pool, &entry(15, Some("Lasagne"))).await.unwrap();
        let again = upsert_from_feed(&pool, &entry(15, Some("Lasagne"))).await.unwrap();
        let changed = upsert_from_feed(&pool, &entry(15, Some("Pasta"))).await.unwrap();

        assert_eq!(first, UpsertOutcome::Inserted);
        assert_eq!(again, UpsertOutcome::Unchanged);
        assert_eq!(changed, UpsertOutcome::Updated);

        let item = load_menu_item(&pool, date(15)).await.unwrap().unwrap();
        assert_eq!(item.food_name.as_deref(), Some("Pasta"));
        assert!(!item.manual);
    }

    #[tokio::test]
    async fn test_manual_row_is_protected() {
        let pool = init_memory_database().await.unwrap();
        upsert_from_feed(&pool, &entry(15, Some("Old"))).await.unwrap();
        apply_manual_edit(&pool, date(15), &ManualEdit::default()).await.unwrap();

        let mut upstream = entry(15, Some("New"));
        upstream.day = "Tirsdag".to_string();
        upstream.week_number = 17;
        let outcome = upsert_from_feed(&pool, &upstream).await.unwrap();

        assert_eq!(outcome, UpsertOutcome::ManualProtected);
        let item = load_menu_item(&pool, date(15)).await.unwrap().unwrap();
        assert_eq!(item.food_name.as_deref(), Some("Old"));
        assert_eq!(item.day, "Mandag");
        assert_eq!(item.week_number, 16);
        assert!(item.manual);
    }

    #[tokio::test]
    async fn test_derived_setters_only_fill_nulls() {
        let pool = init_memory_database().await.unwrap();
        upsert_from_feed(&pool, &entry(15, Some("Lasagne"))).await.unwrap();

        assert!(set_corrected_name(&pool, date(15), "Lasagne").await.unwrap());
        assert!(!set_corrected_name(&pool, date(15), "Other").await.unwrap());
        assert!(set_food_contents(&pool, date(15), &[]).await.unwrap());
        assert!(!set_food_contents(&pool, date(15), &["kød".to_string()]).await.unwrap());

        let item = load_menu_item(&pool, date(15)).await.unwrap().unwrap();
        assert_eq!(item.corrected_food_name.as_deref(), Some("Lasagne"));
        assert_eq!(item.food_contents, Some(vec![]));
    }

    #[tokio::test]
    async fn test_description_subject_prefers_corrected_name() {
        let pool = init_memory_database().await.unwrap();
        upsert_from_feed(&pool, &entry(15, Some("lasange m/ salat"))).await.unwrap();
        upsert_from_feed(&pool, &entry(16, Some("Suppe"))).await.unwrap();
        set_corrected_name(&pool, date(15), "Lasagne med salat").await.unwrap();

        let pending = items_missing_description(&pool).await.unwrap();

        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].subject, "Lasagne med salat");
        assert_eq!(pending[1].subject, "Suppe");
    }

    #[tokio::test]
    async fn test_nameless_rows_are_not_pending() {
        let pool = init_memory_database().await.unwrap();
        upsert_from_feed(&pool, &entry(15, None)).await.unwrap();

        assert!(items_missing_contents(&pool).await.unwrap().is_empty());
        assert!(items_missing_corrected_name(&pool).await.unwrap().is_empty());
        assert!(items_missing_description(&pool).await.unwrap().is_empty());
        assert!(items_without_image(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_manual_edit_requires_day_to_create() {
        let pool = init_memory_database().await.unwrap();

        let err = apply_manual_edit(&pool, date(20), &ManualEdit::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let edit = ManualEdit {
            day: Some("Lørdag".to_string()),
            week_number: Some(16),
            food_name: Some("Brunch".to_string()),
            food_contents: Some(vec!["vegansk".to_string()]),
            ..Default::default()
        };
        let item = apply_manual_edit(&pool, date(20), &edit).await.unwrap();
        assert!(item.manual);
        assert_eq!(item.food_contents, Some(vec!["vegansk".to_string()]));
    }
}
