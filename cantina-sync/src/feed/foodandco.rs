//! Food&Co weekly menu API client

use super::{FeedEntry, FeedError, MenuFeed, WeeklyMenu};
use async_trait::async_trait;
use cantina_common::config::FeedConfig;
use cantina_common::time::parse_date_prefix;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = concat!("cantina-sync/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Weekly menu response body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeeklyMenuResponse {
    #[serde(default)]
    week_number: i64,
    #[serde(default)]
    days: Vec<DayResponse>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DayResponse {
    date: String,
    day_of_week: String,
    #[serde(default)]
    menus: Vec<MenuResponse>,
}

#[derive(Debug, Clone, Deserialize)]
struct MenuResponse {
    menu: Option<String>,
}

impl WeeklyMenuResponse {
    fn into_weekly_menu(self) -> Result<WeeklyMenu, FeedError> {
        let week_number = self.week_number;
        let entries = self
            .days
            .into_iter()
            .map(|day| {
                let date = parse_date_prefix(&day.date).ok_or_else(|| {
                    FeedError::ParseError(format!("Invalid day date: {:?}", day.date))
                })?;
                let food_name = day.menus.into_iter().next().and_then(|m| m.menu);
                Ok(FeedEntry {
                    date,
                    day: day.day_of_week,
                    week_number,
                    food_name,
                })
            })
            .collect::<Result<Vec<_>, FeedError>>()?;

        Ok(WeeklyMenu {
            week_number,
            entries,
        })
    }
}

/// Food&Co API client
pub struct FoodAndCoClient {
    http_client: reqwest::Client,
    config: FeedConfig,
}

impl FoodAndCoClient {
    pub fn new(config: FeedConfig) -> Result<Self, FeedError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| FeedError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            config,
        })
    }
}

#[async_trait]
impl MenuFeed for FoodAndCoClient {
    async fn fetch_week(&self, anchor: NaiveDate) -> Result<WeeklyMenu, FeedError> {
        let params = [
            ("restaurantId", self.config.restaurant_id.to_string()),
            ("languageCode", self.config.language_code.clone()),
            ("date", anchor.format("%Y-%m-%d").to_string()),
        ];

        tracing::debug!(anchor = %anchor, url = %self.config.base_url, "Querying weekly menu");

        let response = self
            .http_client
            .get(&self.config.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| FeedError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FeedError::ApiError(status.as_u16(), error_text));
        }

        let body: WeeklyMenuResponse = response
            .json()
            .await
            .map_err(|e| FeedError::ParseError(e.to_string()))?;

        let page = body.into_weekly_menu()?;

        tracing::debug!(
            anchor = %anchor,
            week_number = page.week_number,
            days = page.entries.len(),
            "Retrieved weekly menu"
        );

        Ok(page)
    }
}
