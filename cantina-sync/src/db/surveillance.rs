//! Surveillance duty records (who covers MDM / EDI monitoring in a given week)

use cantina_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

/// Monitoring duty type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurveillanceType {
    #[serde(rename = "MDM")]
    Mdm,
    #[serde(rename = "EDI")]
    Edi,
}

impl SurveillanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurveillanceType::Mdm => "MDM",
            SurveillanceType::Edi => "EDI",
        }
    }
}

impl FromStr for SurveillanceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MDM" => Ok(SurveillanceType::Mdm),
            "EDI" => Ok(SurveillanceType::Edi),
            other => Err(Error::InvalidInput(format!("Unknown surveillance type: {}", other))),
        }
    }
}

/// New record to insert
#[derive(Debug, Clone)]
pub struct NewSurveillance {
    pub kind: SurveillanceType,
    pub year: i64,
    pub week: i64,
    pub responsible: String,
}

/// Stored record
#[derive(Debug, Clone, Serialize)]
pub struct SurveillanceRecord {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: SurveillanceType,
    pub year: i64,
    pub week: i64,
    pub responsible: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

/// Insert a record, returning its id
pub async fn insert_record(pool: &SqlitePool, record: &NewSurveillance) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO surveillance (type, year, week, responsible) VALUES (?, ?, ?, ?)",
    )
    .bind(record.kind.as_str())
    .bind(record.year)
    .bind(record.week)
    .bind(&record.responsible)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Records for (`year`, `week`) or later, in chronological order
pub async fn load_from_week(pool: &SqlitePool, year: i64, week: i64) -> Result<Vec<SurveillanceRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, type, year, week, responsible, created_at
        FROM surveillance
        WHERE year > ? OR (year = ? AND week >= ?)
        ORDER BY year ASC, week ASC, id ASC
        "#,
    )
    .bind(year)
    .bind(year)
    .bind(week)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let kind: String = row.try_get("type")?;
            Ok(SurveillanceRecord {
                id: row.try_get("id")?,
                kind: kind.parse()?,
                year: row.try_get("year")?,
                week: row.try_get("week")?,
                responsible: row.try_get("responsible")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .collect()
}
