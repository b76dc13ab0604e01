//! Fetch + reconcile stage
//!
//! Pages the upstream feed one week at a time and merges every day into the
//! store as it arrives, so a failure on page k keeps pages 1..k.

use chrono::{Duration, NaiveDate};
use sqlx::SqlitePool;

use super::PipelineError;
use crate::db::menus::{self, UpsertOutcome};
use crate::feed::MenuFeed;

/// Stop paging after this many weeks even if the provider keeps answering
const MAX_WEEKS_AHEAD: usize = 104;

/// Fetch stage counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Pages requested, including the terminating empty page
    pub pages: usize,
    /// Days returned across all pages
    pub days: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub manual_protected: usize,
}

impl FetchReport {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
            UpsertOutcome::ManualProtected => self.manual_protected += 1,
        }
    }
}

/// Page the feed from `start` until an empty week, reconciling each day
pub async fn sync_feed(
    pool: &SqlitePool,
    feed: &dyn MenuFeed,
    start: NaiveDate,
) -> Result<FetchReport, PipelineError> {
    tracing::info!(start = %start, "Fetching menu items...");

    let mut report = FetchReport::default();
    let mut anchor = start;

    loop {
        if report.pages >= MAX_WEEKS_AHEAD {
            tracing::warn!(
                pages = report.pages,
                "Upstream feed never returned an empty week, stopping pagination"
            );
            break;
        }

        let page = match feed.fetch_week(anchor).await {
            Ok(page) => page,
            Err(e) => {
                tracing::error!(
                    anchor = %anchor,
                    days_reconciled = report.days,
                    error = %e,
                    "Weekly menu fetch failed"
                );
                return Err(e.into());
            }
        };
        report.pages += 1;

        if page.is_empty() {
            break;
        }

        report.days += page.entries.len();
        for entry in &page.entries {
            let outcome = menus::upsert_from_feed(pool, entry).await?;
            tracing::debug!(date = %entry.date, outcome = ?outcome, "Reconciled menu day");
            report.record(outcome);
        }

        anchor += Duration::weeks(1);
    }

    tracing::info!(
        days = report.days,
        inserted = report.inserted,
        updated = report.updated,
        manual_protected = report.manual_protected,
        "Found {} menu items.",
        report.days
    );

    Ok(report)
}
