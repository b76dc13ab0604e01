//! Surveillance duty listing

use axum::{extract::State, routing::get, Json, Router};
use std::collections::BTreeMap;

use crate::db::surveillance::{self, SurveillanceRecord};
use crate::error::ApiResult;
use crate::AppState;

/// GET /surveillance
///
/// Records from the current ISO week onward, grouped by type.
pub async fn get_surveillance(
    State(state): State<AppState>,
) -> ApiResult<Json<BTreeMap<&'static str, Vec<SurveillanceRecord>>>> {
    let (year, week) = cantina_common::time::iso_week(cantina_common::time::today());
    let records = surveillance::load_from_week(&state.db, year as i64, week as i64).await?;

    let mut grouped: BTreeMap<&'static str, Vec<SurveillanceRecord>> = BTreeMap::new();
    for record in records {
        grouped.entry(record.kind.as_str()).or_default().push(record);
    }

    Ok(Json(grouped))
}

/// Build surveillance routes
pub fn surveillance_routes() -> Router<AppState> {
    Router::new().route("/surveillance", get(get_surveillance))
}
