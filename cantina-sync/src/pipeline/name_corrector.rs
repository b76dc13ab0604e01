//! Dish name correction stage

use sqlx::SqlitePool;

use super::content_tagger::dish_prompt;
use super::{PipelineError, StageCounts};
use crate::db::menus;
use crate::generation::Generator;

const SYSTEM_PROMPT: &str = "Din opgave er at omskrive navnet på madretter til at være \
    grammatisk korrekt og stavet rigtigt. Undgå at slutte med tegnsætning. \
    Forkortelser må gerne bruges eller bibeholdes. Du skal kun svare med navnet og intet andet.";

/// Correct every item whose corrected name is still NULL
pub async fn correct_names(
    pool: &SqlitePool,
    generator: &dyn Generator,
) -> Result<StageCounts, PipelineError> {
    tracing::info!("Correcting the grammar in food names...");

    let pending = menus::items_missing_corrected_name(pool).await?;
    let mut counts = StageCounts {
        pending: pending.len(),
        ..Default::default()
    };

    for item in &pending {
        match generator.complete(SYSTEM_PROMPT, &dish_prompt(&item.subject)).await {
            Ok(corrected) => {
                if menus::set_corrected_name(pool, item.date, &corrected).await? {
                    counts.updated += 1;
                }
            }
            Err(e) => {
                counts.failed += 1;
                tracing::warn!(date = %item.date, error = %e, "Food name correction failed");
            }
        }
    }

    tracing::info!(
        failed = counts.failed,
        "Corrected the food name of {} menu items.",
        counts.updated
    );

    Ok(counts)
}
