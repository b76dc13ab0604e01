//! Synchronization & enrichment pipeline
//!
//! A run executes its stages strictly in order, each draining fully before the
//! next starts:
//!
//! 1. fetch + reconcile upstream weekly pages
//! 2. tag dietary contents
//! 3. correct dish names
//! 4. describe dishes
//! 5. synthesize images
//!
//! Inside the enrichment stages every item is handled on its own: a failed
//! generation call is logged and the item stays NULL until a later run.
//! Garbage collection of image files runs on its own schedule, see [`asset_collector`].

pub mod asset_collector;
pub mod content_tagger;
pub mod description_generator;
pub mod image_synthesizer;
pub mod name_corrector;
pub mod reconciler;

pub use asset_collector::{collect_garbage, CollectionReport};
pub use reconciler::FetchReport;

use chrono::NaiveDate;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::feed::{FeedError, MenuFeed};
use crate::generation::Generator;

/// Stage-level failures
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Paging the upstream feed failed; pages reconciled before it are kept
    #[error("Upstream fetch failed: {0}")]
    UpstreamFetch(#[from] FeedError),

    /// Store read/write failed; aborts the current stage
    #[error("Storage error: {0}")]
    Storage(#[from] cantina_common::Error),

    /// Asset directory could not be accessed
    #[error("Asset IO error: {0}")]
    AssetIo(#[from] std::io::Error),
}

/// Per-stage item counts for an enrichment stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    /// Items that needed the derived field at stage start
    pub pending: usize,
    /// Items whose derived field was stored
    pub updated: usize,
    /// Items left for a later run
    pub failed: usize,
}

/// Summary of one pipeline run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// `None` when the fetch stage aborted
    pub fetch: Option<FetchReport>,
    pub contents: StageCounts,
    pub names: StageCounts,
    pub descriptions: StageCounts,
    pub images: StageCounts,
}

/// The fetch + enrich pipeline and its collaborators
#[derive(Clone)]
pub struct Pipeline {
    pool: SqlitePool,
    feed: Arc<dyn MenuFeed>,
    generator: Arc<dyn Generator>,
    categories: Vec<String>,
    asset_dir: PathBuf,
}

impl Pipeline {
    pub fn new(
        pool: SqlitePool,
        feed: Arc<dyn MenuFeed>,
        generator: Arc<dyn Generator>,
        categories: Vec<String>,
        asset_dir: PathBuf,
    ) -> Self {
        Self {
            pool,
            feed,
            generator,
            categories,
            asset_dir,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn asset_dir(&self) -> &Path {
        &self.asset_dir
    }

    /// Run all stages, paging the feed from today
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        self.run_from(cantina_common::time::today()).await
    }

    /// Run all stages, paging the feed from `start`
    ///
    /// An upstream failure ends the fetch stage only; enrichment still runs over
    /// the rows already stored. A storage failure aborts the remaining stages.
    pub async fn run_from(&self, start: NaiveDate) -> Result<RunReport, PipelineError> {
        let mut report = RunReport::default();

        match reconciler::sync_feed(&self.pool, self.feed.as_ref(), start).await {
            Ok(fetch) => report.fetch = Some(fetch),
            Err(PipelineError::UpstreamFetch(e)) => {
                tracing::error!(error = %e, "Fetch stage aborted, continuing with stored menu items");
            }
            Err(e) => return Err(e),
        }

        report.contents =
            content_tagger::tag_contents(&self.pool, self.generator.as_ref(), &self.categories)
                .await?;
        report.names = name_corrector::correct_names(&self.pool, self.generator.as_ref()).await?;
        report.descriptions =
            description_generator::describe_items(&self.pool, self.generator.as_ref()).await?;
        report.images = image_synthesizer::synthesize_images(
            &self.pool,
            self.generator.as_ref(),
            &self.asset_dir,
        )
        .await?;

        Ok(report)
    }
}
