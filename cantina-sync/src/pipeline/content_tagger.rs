//! Dietary content tagging stage
//!
//! For each untagged item, asks one yes/no question per category and stores
//! the matched set. An empty set is stored too: it marks the item as processed.

use sqlx::SqlitePool;

use super::{PipelineError, StageCounts};
use crate::db::menus;
use crate::generation::{GenerationError, Generator};

fn system_prompt(category: &str) -> String {
    format!(
        "Din opgave er at afgøre om der er {category} i denne ret. \
         Hvis den indeholder {category} skal du svare med \"ja\" og ikke andet. \
         Hvis ikke den indeholder {category} skal du svare med \"nej\" og ikke andet."
    )
}

pub(crate) fn dish_prompt(name: &str) -> String {
    format!("Retten hedder \"{}\"", name)
}

/// Interpret a yes/no answer. `None` for anything else.
pub fn parse_answer(answer: &str) -> Option<bool> {
    let normalized = answer
        .trim()
        .trim_end_matches(['.', '!'])
        .trim_matches('"')
        .to_lowercase();

    match normalized.as_str() {
        "ja" => Some(true),
        "nej" => Some(false),
        _ => None,
    }
}

/// Ask every category question for one dish, in category order
pub async fn classify(
    generator: &dyn Generator,
    name: &str,
    categories: &[String],
) -> Result<Vec<String>, GenerationError> {
    let prompt = dish_prompt(name);
    let mut contents = Vec::new();

    for category in categories {
        let answer = generator.complete(&system_prompt(category), &prompt).await?;
        match parse_answer(&answer) {
            Some(true) => contents.push(category.clone()),
            Some(false) => {}
            None => {
                return Err(GenerationError::Unusable(format!(
                    "expected ja/nej for {}, got {:?}",
                    category, answer
                )))
            }
        }
    }

    Ok(contents)
}

/// Tag every item whose contents are still NULL
pub async fn tag_contents(
    pool: &SqlitePool,
    generator: &dyn Generator,
    categories: &[String],
) -> Result<StageCounts, PipelineError> {
    tracing::info!("Updating the food contents of menu items...");

    let pending = menus::items_missing_contents(pool).await?;
    let mut counts = StageCounts {
        pending: pending.len(),
        ..Default::default()
    };

    for item in &pending {
        match classify(generator, &item.subject, categories).await {
            Ok(contents) => {
                if menus::set_food_contents(pool, item.date, &contents).await? {
                    counts.updated += 1;
                }
                tracing::debug!(date = %item.date, contents = ?contents, "Food contents tagged");
            }
            Err(e) => {
                counts.failed += 1;
                tracing::warn!(date = %item.date, error = %e, "Food content classification failed");
            }
        }
    }

    tracing::info!(
        failed = counts.failed,
        "Updated the food contents of {} menu items.",
        counts.updated
    );

    Ok(counts)
}
