//! Image synthesis stage
//!
//! For each item without an image row: generate an image, write it to the
//! asset directory under a random 8-hex-character name and link it to the item.

use chrono::NaiveDate;
use sqlx::SqlitePool;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use super::{PipelineError, StageCounts};
use crate::db::images::{self, ImageRecord};
use crate::db::menus;
use crate::generation::{GeneratedImage, Generator};

/// Image prompt for a dish
pub fn image_prompt(food_name: &str) -> String {
    format!("Food called \"{}\"", food_name)
}

/// Fresh random asset filename, e.g. `9f3a0c1e.png`
pub fn random_filename() -> String {
    format!("{:08x}.png", rand::random::<u32>())
}

/// Outcome of storing one generated image
enum StoreOutcome {
    Linked(String),
    /// Asset write failed; item is left for a later run
    WriteFailed(std::io::Error),
}

async fn remove_asset(asset_dir: &Path, filename: &str) {
    if let Err(e) = tokio::fs::remove_file(asset_dir.join(filename)).await {
        tracing::warn!(file = %filename, error = %e, "Failed to remove unlinked image file");
    }
}

/// Create `filename` exclusively; `Ok(false)` when it already exists
async fn write_new_asset(asset_dir: &Path, filename: &str, bytes: &[u8]) -> std::io::Result<bool> {
    let file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(asset_dir.join(filename))
        .await;
    let mut file = match file {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e),
    };
    file.write_all(bytes).await?;
    file.flush().await?;
    Ok(true)
}

/// Write the file and insert its row, drawing a new filename once on a
/// name collision
async fn store_image(
    pool: &SqlitePool,
    asset_dir: &Path,
    date: NaiveDate,
    prompt: &str,
    image: &GeneratedImage,
) -> Result<StoreOutcome, PipelineError> {
    store_image_with(pool, asset_dir, date, prompt, image, random_filename).await
}

async fn store_image_with(
    pool: &SqlitePool,
    asset_dir: &Path,
    date: NaiveDate,
    prompt: &str,
    image: &GeneratedImage,
    mut next_name: impl FnMut() -> String,
) -> Result<StoreOutcome, PipelineError> {
    let mut retried = false;

    loop {
        let filename = next_name();

        match write_new_asset(asset_dir, &filename, &image.bytes).await {
            Ok(true) => {}
            Ok(false) if !retried => {
                tracing::warn!(date = %date, file = %filename, "Image file exists, drawing a new filename");
                retried = true;
                continue;
            }
            Ok(false) => {
                return Ok(StoreOutcome::WriteFailed(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("{} already exists", filename),
                )));
            }
            Err(e) => {
                remove_asset(asset_dir, &filename).await;
                return Ok(StoreOutcome::WriteFailed(e));
            }
        }

        let record = ImageRecord {
            path: filename.clone(),
            prompt: Some(prompt.to_string()),
            revised_prompt: image.revised_prompt.clone(),
            menu_date: Some(date),
        };

        match images::insert_image(pool, &record).await {
            Ok(()) => return Ok(StoreOutcome::Linked(filename)),
            Err(e) if e.is_unique_violation() && !retried => {
                tracing::warn!(date = %date, file = %filename, "Image path collision, drawing a new filename");
                remove_asset(asset_dir, &filename).await;
                retried = true;
            }
            Err(e) => {
                remove_asset(asset_dir, &filename).await;
                return Err(e.into());
            }
        }
    }
}

/// Generate images for every item that has none
pub async fn synthesize_images(
    pool: &SqlitePool,
    generator: &dyn Generator,
    asset_dir: &Path,
) -> Result<StageCounts, PipelineError> {
    tracing::info!("Updating the images of menu items...");

    let pending = menus::items_without_image(pool).await?;
    let mut counts = StageCounts {
        pending: pending.len(),
        ..Default::default()
    };

    for item in &pending {
        let prompt = image_prompt(&item.subject);

        let image = match generator.generate_image(&prompt).await {
            Ok(image) => image,
            Err(e) => {
                counts.failed += 1;
                tracing::warn!(date = %item.date, error = %e, "Image generation failed");
                continue;
            }
        };

        match store_image(pool, asset_dir, item.date, &prompt, &image).await {
            Ok(StoreOutcome::Linked(filename)) => {
                counts.updated += 1;
                tracing::debug!(date = %item.date, file = %filename, "Image linked");
            }
            Ok(StoreOutcome::WriteFailed(e)) => {
                counts.failed += 1;
                tracing::warn!(date = %item.date, error = %e, "Failed to write image file");
            }
            Err(PipelineError::Storage(e)) if e.is_unique_violation() => {
                // Second collision, or the date was linked concurrently
                counts.failed += 1;
                tracing::warn!(date = %item.date, error = %e, "Image row rejected as duplicate");
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(failed = counts.failed, "Updated the images of {} menu items.", counts.updated);

    Ok(counts)
}
