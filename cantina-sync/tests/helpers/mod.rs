//! Test doubles shared by the cantina-sync integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use cantina_sync::feed::{FeedEntry, FeedError, MenuFeed, WeeklyMenu};
use cantina_sync::generation::{GeneratedImage, GenerationError, Generator};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Dish names containing this marker fail every generation call
pub const FAILING_DISH: &str = "FEJL";

/// Dish names containing this marker get an unusable answer for [`UNCLEAR_CATEGORY`]
pub const UNCLEAR_DISH: &str = "UKLAR";
pub const UNCLEAR_CATEGORY: &str = "kød";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Monday..Friday of the ISO week starting at `monday`
pub fn work_week(monday: NaiveDate, names: [Option<&str>; 5]) -> WeeklyMenu {
    let days = ["Mandag", "Tirsdag", "Onsdag", "Torsdag", "Fredag"];
    let week_number = monday.iso_week().week() as i64;
    let entries = names
        .iter()
        .zip(days)
        .enumerate()
        .map(|(offset, (name, day))| FeedEntry {
            date: monday + Duration::days(offset as i64),
            day: day.to_string(),
            week_number,
            food_name: name.map(str::to_string),
        })
        .collect();
    WeeklyMenu {
        week_number,
        entries,
    }
}

/// Feed replaying scripted pages; an empty page once the script runs out
#[derive(Default)]
pub struct ScriptedFeed {
    pages: Mutex<VecDeque<Result<WeeklyMenu, FeedError>>>,
    anchors: Mutex<Vec<NaiveDate>>,
}

impl ScriptedFeed {
    pub fn new(pages: Vec<Result<WeeklyMenu, FeedError>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            anchors: Mutex::new(Vec::new()),
        }
    }

    /// Anchors requested so far
    pub fn anchors(&self) -> Vec<NaiveDate> {
        self.anchors.lock().unwrap().clone()
    }
}

#[async_trait]
impl MenuFeed for ScriptedFeed {
    async fn fetch_week(&self, anchor: NaiveDate) -> Result<WeeklyMenu, FeedError> {
        self.anchors.lock().unwrap().push(anchor);
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(WeeklyMenu::default()))
    }
}

/// Deterministic generator keyed on the Danish system prompts
///
/// - tagging: "ja" when the dish name contains the category, an unusable
///   answer for [`UNCLEAR_CATEGORY`] on [`UNCLEAR_DISH`] dishes
/// - name correction: `<name> (rettet)`
/// - description: `Beskrivelse af <name>`
#[derive(Default)]
pub struct FakeGenerator {
    pub text_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
}

impl FakeGenerator {
    pub fn text_calls(&self) -> usize {
        self.text_calls.load(Ordering::SeqCst)
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }
}

fn quoted(text: &str) -> &str {
    let start = text.find('"').map(|i| i + 1).unwrap_or(0);
    let end = text.rfind('"').filter(|&i| i >= start).unwrap_or(text.len());
    &text[start..end]
}

fn tagged_category(system: &str) -> Option<&str> {
    let rest = system.split("om der er ").nth(1)?;
    rest.split(" i denne ret").next()
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, GenerationError> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        let name = quoted(prompt);
        if name.contains(FAILING_DISH) {
            return Err(GenerationError::ApiError(500, "scripted failure".to_string()));
        }

        if let Some(category) = tagged_category(system) {
            if name.contains(UNCLEAR_DISH) && category == UNCLEAR_CATEGORY {
                return Ok("Det kommer an på tilberedningen".to_string());
            }
            let answer = if name.to_lowercase().contains(category) { "Ja." } else { "nej" };
            return Ok(answer.to_string());
        }
        if system.contains("omskrive") {
            return Ok(format!("{} (rettet)", name));
        }
        if system.contains("beskrive") {
            return Ok(format!("Beskrivelse af {}", name));
        }
        Err(GenerationError::Unusable(format!("unexpected system prompt: {}", system)))
    }

    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, GenerationError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        if prompt.contains(FAILING_DISH) {
            return Err(GenerationError::DownloadError("scripted failure".to_string()));
        }
        Ok(GeneratedImage {
            bytes: b"\x89PNG fake".to_vec(),
            revised_prompt: Some(format!("revised: {}", prompt)),
        })
    }
}
