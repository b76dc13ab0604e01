//! HTTP client tests against an in-process stand-in server

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use cantina_common::config::{FeedConfig, GenerationConfig};
use cantina_sync::feed::{FeedError, FoodAndCoClient, MenuFeed};
use cantina_sync::generation::{GenerationError, Generator, OpenAiClient};
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Serve `app` on an ephemeral port, returning its base URL
async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

type Seen = Arc<Mutex<Vec<HashMap<String, String>>>>;

async fn weekly_menu(
    State(seen): State<Seen>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let date = params.get("date").cloned().unwrap_or_default();
    seen.lock().unwrap().push(params);

    if date == "2024-03-04" {
        Json(json!({
            "weekNumber": 10,
            "days": [
                {
                    "date": "2024-03-04T00:00:00",
                    "dayOfWeek": "Mandag",
                    "menus": [{ "menu": "Boller i karry", "type": "Dagens ret" }]
                },
                { "date": "2024-03-05T00:00:00", "dayOfWeek": "Tirsdag", "menus": [] }
            ]
        }))
    } else {
        Json(json!({ "weekNumber": 11, "days": [] }))
    }
}

fn feed_config(base_url: String) -> FeedConfig {
    FeedConfig {
        base_url,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_feed_client_queries_and_parses_week() {
    let seen: Seen = Arc::default();
    let app = Router::new()
        .route("/api/WeeklyMenu", get(weekly_menu))
        .with_state(seen.clone());
    let base = serve(app).await;

    let client = FoodAndCoClient::new(feed_config(format!("{}/api/WeeklyMenu", base))).unwrap();
    let page = client
        .fetch_week(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap())
        .await
        .unwrap();

    assert_eq!(page.week_number, 10);
    assert_eq!(page.entries.len(), 2);
    assert_eq!(page.entries[0].food_name.as_deref(), Some("Boller i karry"));
    assert_eq!(page.entries[0].day, "Mandag");
    assert_eq!(page.entries[1].food_name, None);

    let params = seen.lock().unwrap()[0].clone();
    assert_eq!(params.get("restaurantId").map(String::as_str), Some("1089"));
    assert_eq!(params.get("languageCode").map(String::as_str), Some("da-DK"));
    assert_eq!(params.get("date").map(String::as_str), Some("2024-03-04"));

    let next = client
        .fetch_week(NaiveDate::from_ymd_opt(2024, 3, 11).unwrap())
        .await
        .unwrap();
    assert!(next.is_empty());
}

#[tokio::test]
async fn test_feed_client_reports_http_errors() {
    let app = Router::new().route(
        "/api/WeeklyMenu",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
    );
    let base = serve(app).await;

    let client = FoodAndCoClient::new(feed_config(format!("{}/api/WeeklyMenu", base))).unwrap();
    let err = client
        .fetch_week(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, FeedError::ApiError(503, ref body) if body == "maintenance"));
}

#[tokio::test]
async fn test_feed_client_reports_malformed_body() {
    let app = Router::new().route("/api/WeeklyMenu", get(|| async { "<html>not json</html>" }));
    let base = serve(app).await;

    let client = FoodAndCoClient::new(feed_config(format!("{}/api/WeeklyMenu", base))).unwrap();
    let err = client
        .fetch_week(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, FeedError::ParseError(_)));
}

fn generation_config(base_url: String) -> GenerationConfig {
    GenerationConfig {
        base_url,
        ..Default::default()
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[tokio::test]
async fn test_completion_returns_trimmed_first_choice() {
    let requests: Arc<Mutex<Vec<Value>>> = Arc::default();
    let app = Router::new()
        .route(
            "/v1/chat/completions",
            post(
                |State(requests): State<Arc<Mutex<Vec<Value>>>>,
                 headers: HeaderMap,
                 Json(body): Json<Value>| async move {
                    if bearer(&headers).as_deref() != Some("Bearer test-key") {
                        return (StatusCode::UNAUTHORIZED, Json(json!({})));
                    }
                    requests.lock().unwrap().push(body);
                    (
                        StatusCode::OK,
                        Json(json!({
                            "choices": [{ "message": { "role": "assistant", "content": "  Boller i karry \n" } }]
                        })),
                    )
                },
            ),
        )
        .with_state(requests.clone());
    let base = serve(app).await;

    let client = OpenAiClient::new("test-key".to_string(), generation_config(format!("{}/v1/", base))).unwrap();
    let answer = client.complete("system text", "user text").await.unwrap();
    assert_eq!(answer, "Boller i karry");

    let body = requests.lock().unwrap()[0].clone();
    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][0]["content"], "system text");
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["messages"][1]["content"], "user text");
}

#[tokio::test]
async fn test_completion_without_choices_is_empty_response() {
    let app = Router::new().route(
        "/chat/completions",
        post(|| async { Json(json!({ "choices": [] })) }),
    );
    let base = serve(app).await;

    let client = OpenAiClient::new("k".to_string(), generation_config(base)).unwrap();
    let err = client.complete("s", "p").await.unwrap_err();
    assert!(matches!(err, GenerationError::EmptyResponse));
}

#[tokio::test]
async fn test_image_generation_downloads_bytes() {
    let requests: Arc<Mutex<Vec<Value>>> = Arc::default();
    let base_slot: Arc<Mutex<String>> = Arc::default();

    let app = Router::new()
        .route(
            "/images/generations",
            post({
                let requests = requests.clone();
                let base_slot = base_slot.clone();
                move |Json(body): Json<Value>| async move {
                    requests.lock().unwrap().push(body);
                    let base = base_slot.lock().unwrap().clone();
                    Json(json!({
                        "data": [{
                            "url": format!("{}/files/generated.png", base),
                            "revised_prompt": "A plate of meatballs in curry sauce"
                        }]
                    }))
                }
            }),
        )
        .route("/files/generated.png", get(|| async { vec![0x89u8, b'P', b'N', b'G'] }));
    let base = serve(app).await;
    *base_slot.lock().unwrap() = base.clone();

    let client = OpenAiClient::new("k".to_string(), generation_config(base)).unwrap();
    let image = client.generate_image("Food called \"Boller i karry\"").await.unwrap();

    assert_eq!(image.bytes, vec![0x89, b'P', b'N', b'G']);
    assert_eq!(
        image.revised_prompt.as_deref(),
        Some("A plate of meatballs in curry sauce")
    );

    let body = requests.lock().unwrap()[0].clone();
    assert_eq!(body["model"], "dall-e-3");
    assert_eq!(body["n"], 1);
    assert_eq!(body["size"], "1792x1024");
    assert_eq!(body["quality"], "hd");
    assert_eq!(body["prompt"], "Food called \"Boller i karry\"");
}

#[tokio::test]
async fn test_image_download_failure_is_reported() {
    let base_slot: Arc<Mutex<String>> = Arc::default();
    let app = Router::new()
        .route(
            "/images/generations",
            post({
                let base_slot = base_slot.clone();
                move || async move {
                    let base = base_slot.lock().unwrap().clone();
                    Json(json!({ "data": [{ "url": format!("{}/missing.png", base) }] }))
                }
            }),
        );
    let base = serve(app).await;
    *base_slot.lock().unwrap() = base.clone();

    let client = OpenAiClient::new("k".to_string(), generation_config(base)).unwrap();
    let err = client.generate_image("Food").await.unwrap_err();
    assert!(matches!(err, GenerationError::DownloadError(_)));
}

#[test]
fn test_zero_request_rate_is_rejected() {
    let config = GenerationConfig {
        requests_per_minute: 0,
        ..Default::default()
    };
    assert!(matches!(
        OpenAiClient::new("k".to_string(), config),
        Err(GenerationError::Configuration(_))
    ));
}
