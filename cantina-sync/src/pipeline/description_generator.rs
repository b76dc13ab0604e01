//! Dish description stage

use sqlx::SqlitePool;

use super::content_tagger::dish_prompt;
use super::{PipelineError, StageCounts};
use crate::db::menus;
use crate::generation::Generator;

const SYSTEM_PROMPT: &str = "Din opgave er at beskrive madretter på en kort måde. \
    Du skal svare med kun beskrivelsen og intet andet.";

/// Describe every item whose description is still NULL
///
/// The corrected name is used as subject when one exists.
pub async fn describe_items(
    pool: &SqlitePool,
    generator: &dyn Generator,
) -> Result<StageCounts, PipelineError> {
    tracing::info!("Describing the menu items...");

    let pending = menus::items_missing_description(pool).await?;
    let mut counts = StageCounts {
        pending: pending.len(),
        ..Default::default()
    };

    for item in &pending {
        match generator.complete(SYSTEM_PROMPT, &dish_prompt(&item.subject)).await {
            Ok(description) => {
                if menus::set_description(pool, item.date, &description).await? {
                    counts.updated += 1;
                }
            }
            Err(e) => {
                counts.failed += 1;
                tracing::warn!(date = %item.date, error = %e, "Food description failed");
            }
        }
    }

    tracing::info!(failed = counts.failed, "Described {} menu items.", counts.updated);

    Ok(counts)
}
