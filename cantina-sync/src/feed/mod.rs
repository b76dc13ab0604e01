//! Upstream weekly menu feed
//!
//! A feed is paged by week: each page is requested with an anchor date and
//! returns that week's days. An empty page means no further menus are published.

pub mod foodandco;

pub use foodandco::FoodAndCoClient;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

/// Upstream fetch errors. Fatal to the fetch stage of the current run.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// One day of upstream menu data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub date: NaiveDate,
    pub day: String,
    pub week_number: i64,
    /// `None` when the provider published no menu for the day
    pub food_name: Option<String>,
}

/// One weekly page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeeklyMenu {
    pub week_number: i64,
    pub entries: Vec<FeedEntry>,
}

impl WeeklyMenu {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Source of weekly menu pages
#[async_trait]
pub trait MenuFeed: Send + Sync {
    /// Fetch the week containing `anchor`
    async fn fetch_week(&self, anchor: NaiveDate) -> Result<WeeklyMenu, FeedError>;
}
