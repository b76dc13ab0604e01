//! Admin endpoints
//!
//! Every request body carries `key`, checked against the configured admin key.
//! With no admin key configured the routes are open.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{patch, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde_json::{json, Map, Value};

use crate::api::menu::MenuEntry;
use crate::db::images;
use crate::db::menus::{self, ManualEdit};
use crate::db::surveillance::{self, NewSurveillance, SurveillanceType};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Check the request's key against the configured admin key
pub fn authorize(state: &AppState, key: Option<&str>) -> ApiResult<()> {
    match (&state.settings.admin_key, key) {
        (None, _) => Ok(()),
        (Some(_), None) => Err(ApiError::MissingKey),
        (Some(expected), Some(key)) if expected == key => Ok(()),
        (Some(_), Some(_)) => Err(ApiError::InvalidKey),
    }
}

/// Integer from a JSON number or numeric string
fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn present<'a>(body: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    body.get(name).filter(|v| !v.is_null())
}

/// Validate a surveillance body into a new record
pub fn parse_surveillance(body: &Map<String, Value>) -> ApiResult<NewSurveillance> {
    let missing: Vec<String> = ["type", "week", "year", "responsible"]
        .iter()
        .filter(|name| present(body, name).is_none())
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::MissingProperties(missing));
    }

    let kind = present(body, "type")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<SurveillanceType>().ok())
        .ok_or_else(|| {
            ApiError::InvalidValue(
                "Invalid value for property `type`. Expected `MDM` or `EDI`.".to_string(),
            )
        })?;

    let week = present(body, "week")
        .and_then(parse_int)
        .filter(|week| (1..=52).contains(week))
        .ok_or_else(|| {
            ApiError::InvalidValue(
                "Invalid value for property `week`. Expected integer 1 <= n <= 52.".to_string(),
            )
        })?;

    let year = present(body, "year")
        .and_then(parse_int)
        .filter(|year| (1..=3000).contains(year))
        .ok_or_else(|| {
            ApiError::InvalidValue(
                "Invalid value for property `year`. Expected integer 1 <= n <= 3000.".to_string(),
            )
        })?;

    let responsible = present(body, "responsible")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            ApiError::InvalidValue("Invalid value for property `responsible`. Expected string.".to_string())
        })?;

    Ok(NewSurveillance {
        kind,
        year,
        week,
        responsible,
    })
}

/// POST /admin/surveillance
pub async fn create_surveillance(
    State(state): State<AppState>,
    Json(body): Json<Map<String, Value>>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    authorize(&state, body.get("key").and_then(Value::as_str))?;

    let record = parse_surveillance(&body)?;
    let id = surveillance::insert_record(&state.db, &record).await?;

    tracing::info!(
        id,
        kind = record.kind.as_str(),
        year = record.year,
        week = record.week,
        "Surveillance record created"
    );

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

/// PATCH /admin/menu/:date
///
/// Body carries `key` plus any [`ManualEdit`] fields. Applies the supplied
/// fields and marks the row manual, so later upstream fetches leave its day,
/// name and week number alone.
pub async fn edit_menu(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> ApiResult<Json<MenuEntry>> {
    authorize(&state, body.get("key").and_then(Value::as_str))?;

    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date: {}", date)))?;
    let edit = parse_manual_edit(body)?;

    let item = menus::apply_manual_edit(&state.db, date, &edit).await?;
    let image = images::load_image_for_date(&state.db, date).await?;

    tracing::info!(date = %date, "Menu item edited manually");

    Ok(Json(MenuEntry::new(item, image, &state.settings.public_address)))
}

/// Typed edit from an authorized body. Unknown properties (`key`) are ignored.
fn parse_manual_edit(body: Map<String, Value>) -> ApiResult<ManualEdit> {
    serde_json::from_value(Value::Object(body))
        .map_err(|e| ApiError::InvalidValue(format!("Invalid menu edit: {}", e)))
}

/// Build admin routes
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/surveillance", post(create_surveillance))
        .route("/admin/menu/:date", patch(edit_menu))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_missing_properties_listed() {
        let err = parse_surveillance(&body(json!({"type": "MDM", "week": null}))).unwrap_err();
        match err {
            ApiError::MissingProperties(missing) => {
                assert_eq!(missing, vec!["week", "year", "responsible"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let record = parse_surveillance(&body(json!({
            "type": "EDI", "week": "12", "year": "2024", "responsible": "Jeppe"
        })))
        .unwrap();
        assert_eq!(record.kind, SurveillanceType::Edi);
        assert_eq!(record.week, 12);
        assert_eq!(record.year, 2024);
    }

    #[test]
    fn test_out_of_range_week_rejected() {
        for week in [json!(0), json!(53), json!("x")] {
            let err = parse_surveillance(&body(json!({
                "type": "MDM", "week": week, "year": 2024, "responsible": "A"
            })))
            .unwrap_err();
            assert!(matches!(err, ApiError::InvalidValue(_)));
        }
    }

    #[test]
    fn test_manual_edit_fields_parsed() {
        let edit = parse_manual_edit(body(json!({
            "key": "s3cret", "foodName": "Frikadeller", "weekNumber": 2, "foodContents": ["kød"]
        })))
        .unwrap();
        assert_eq!(edit.food_name.as_deref(), Some("Frikadeller"));
        assert_eq!(edit.week_number, Some(2));
        assert_eq!(edit.food_contents, Some(vec!["kød".to_string()]));
        assert_eq!(edit.day, None);
    }

    #[test]
    fn test_manual_edit_wrong_type_rejected() {
        let err = parse_manual_edit(body(json!({ "weekNumber": "two" }))).unwrap_err();
        assert!(matches!(err, ApiError::InvalidValue(_)));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = parse_surveillance(&body(json!({
            "type": "XYZ", "week": 1, "year": 2024, "responsible": "A"
        })))
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidValue(_)));
    }
}
