//! Asset garbage collection
//!
//! Deletes every file in the asset directory that no image row references.
//! Runs independently of the pipeline; a file written by the image stage just
//! before its row insert can be caught in between and removed.

use sqlx::SqlitePool;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::PipelineError;
use crate::db::images;

/// Collection pass counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionReport {
    /// Paths referenced by image rows
    pub referenced: usize,
    /// Files found in the asset directory
    pub scanned: usize,
    pub deleted: usize,
    /// Unreadable entries and failed deletions; retried on the next pass
    pub failed: usize,
}

/// Regular file found in the asset directory
#[derive(Debug)]
struct AssetFile {
    name: OsString,
    path: PathBuf,
}

/// List regular files in `asset_dir`, keeping per-entry read errors
async fn list_files(asset_dir: &Path) -> std::io::Result<Vec<std::io::Result<AssetFile>>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(asset_dir).await?;

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                files.push(Err(e));
                continue;
            }
        };

        match entry.file_type().await {
            Ok(file_type) if file_type.is_file() => files.push(Ok(AssetFile {
                name: entry.file_name(),
                path: entry.path(),
            })),
            Ok(_) => {}
            Err(e) => files.push(Err(e)),
        }
    }

    Ok(files)
}

/// Delete every listed file not in `referenced`
async fn sweep(
    files: Vec<std::io::Result<AssetFile>>,
    referenced: &HashSet<String>,
    report: &mut CollectionReport,
) {
    for file in files {
        let file = match file {
            Ok(file) => file,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(error = %e, "Failed to read asset directory entry");
                continue;
            }
        };
        report.scanned += 1;

        let is_referenced = file
            .name
            .to_str()
            .map(|name| referenced.contains(name))
            .unwrap_or(false);
        if is_referenced {
            continue;
        }

        match tokio::fs::remove_file(&file.path).await {
            Ok(()) => report.deleted += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(file = ?file.name, error = %e, "Failed to delete unreferenced image");
            }
        }
    }
}

/// Delete unreferenced files from `asset_dir`
///
/// Only an unreadable asset directory aborts the pass; errors on single
/// entries are counted in [`CollectionReport::failed`].
pub async fn collect_garbage(
    pool: &SqlitePool,
    asset_dir: &Path,
) -> Result<CollectionReport, PipelineError> {
    tracing::info!("Deleting unreferenced images...");

    let referenced = images::referenced_paths(pool).await?;
    let mut report = CollectionReport {
        referenced: referenced.len(),
        ..Default::default()
    };

    let files = list_files(asset_dir).await?;
    sweep(files, &referenced, &mut report).await;

    tracing::info!(
        scanned = report.scanned,
        failed = report.failed,
        "Deleted {} unreferenced images.",
        report.deleted
    );

    Ok(report)
}
