//! Upcoming menu endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::NaiveDate;
use serde::Serialize;

use crate::db::images::ImageRecord;
use crate::db::menus::{self, MenuItem};
use crate::error::ApiResult;
use crate::AppState;

/// Image as served to clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageView {
    /// Public URL of the image file
    pub path: String,
    pub prompt: Option<String>,
    pub revised_prompt: Option<String>,
}

/// Menu item as served to clients. Not-yet-enriched fields are null.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuEntry {
    pub date: NaiveDate,
    pub day: String,
    pub food_name: Option<String>,
    pub corrected_food_name: Option<String>,
    pub food_description: Option<String>,
    pub food_contents: Vec<String>,
    pub week_number: i64,
    pub image: Option<ImageView>,
}

#[derive(Debug, Serialize)]
pub struct MenuResponse {
    pub menu: Vec<MenuEntry>,
}

fn image_url(public_address: &str, path: &str) -> String {
    format!("{}/images/{}", public_address.trim_end_matches('/'), path)
}

impl MenuEntry {
    pub(crate) fn new(item: MenuItem, image: Option<ImageRecord>, public_address: &str) -> Self {
        Self {
            date: item.date,
            day: item.day,
            food_name: item.food_name,
            corrected_food_name: item.corrected_food_name,
            food_description: item.food_description,
            food_contents: item.food_contents.unwrap_or_default(),
            week_number: item.week_number,
            image: image.map(|image| ImageView {
                path: image_url(public_address, &image.path),
                prompt: image.prompt,
                revised_prompt: image.revised_prompt,
            }),
        }
    }
}

/// GET /menu
///
/// Items dated today or later, oldest first.
pub async fn get_menu(State(state): State<AppState>) -> ApiResult<Json<MenuResponse>> {
    let today = cantina_common::time::today();
    let rows = menus::load_upcoming(&state.db, today).await?;

    let menu = rows
        .into_iter()
        .map(|(item, image)| MenuEntry::new(item, image, &state.settings.public_address))
        .collect();

    Ok(Json(MenuResponse { menu }))
}

/// Build menu routes
pub fn menu_routes() -> Router<AppState> {
    Router::new().route("/menu", get(get_menu))
}
