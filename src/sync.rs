//! Site → library → walker orchestration.
//!
//! A failure while syncing one site never stops the next site, and a failure
//! in one library never stops the next library of the same site. Only site
//! discovery itself is fatal for the run.

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::SyncError;
use crate::models::SiteDescriptor;
use crate::traits::{DriveTree, RecordSink, SiteCatalog};
use crate::walker::{LibraryContext, TreeWalker, WalkOptions, WalkStats};

/// Where the list of site ids comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteSource {
    Discover,
    Fixed(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub sites_synced: usize,
    pub sites_failed: usize,
    pub libraries_synced: usize,
    pub libraries_failed: usize,
    pub totals: WalkStats,
}

pub struct SiteSyncOrchestrator {
    catalog: Arc<dyn SiteCatalog>,
    tree: Arc<dyn DriveTree>,
    sink: Arc<dyn RecordSink>,
    options: WalkOptions,
}

impl SiteSyncOrchestrator {
    pub fn new(
        catalog: Arc<dyn SiteCatalog>,
        tree: Arc<dyn DriveTree>,
        sink: Arc<dyn RecordSink>,
        options: WalkOptions,
    ) -> Self {
        Self {
            catalog,
            tree,
            sink,
            options,
        }
    }

    pub async fn sync_all(&self, source: SiteSource) -> Result<SyncReport, SyncError> {
        let site_ids = match source {
            SiteSource::Discover => self.catalog.discover_sites().await?,
            SiteSource::Fixed(ids) => ids,
        };

        let mut report = SyncReport::default();
        if site_ids.is_empty() {
            info!("no sites to sync");
            return Ok(report);
        }
        info!(count = site_ids.len(), "syncing sites");

        for site_id in &site_ids {
            match self.sync_site(site_id, &mut report).await {
                Ok(()) => report.sites_synced += 1,
                Err(e) => {
                    warn!(site = %site_id, error = %e, "site sync failed");
                    report.sites_failed += 1;
                }
            }
        }

        info!(
            sites = report.sites_synced,
            sites_failed = report.sites_failed,
            records = report.totals.records_written,
            "sync complete"
        );
        Ok(report)
    }

    async fn sync_site(&self, site_id: &str, report: &mut SyncReport) -> Result<(), SyncError> {
        let site = self.catalog.site_info(site_id).await?;
        let libraries = self.tree.list_libraries(site_id).await?;
        info!(site = %site.display_name, libraries = libraries.len(), "syncing site");

        let walker = TreeWalker::new(self.tree.as_ref(), self.sink.as_ref(), &self.options);
        for library in &libraries {
            let ctx = LibraryContext {
                site: &site,
                library,
                target_prefix: target_prefix(&site, &library.name),
            };
            match walker.walk(&ctx).await {
                Ok(stats) => {
                    info!(
                        site = %site.display_name,
                        library = %library.name,
                        files = stats.files,
                        records = stats.records_written,
                        "library synced"
                    );
                    report.libraries_synced += 1;
                    report.totals += stats;
                }
                Err(e) => {
                    warn!(
                        site = %site.display_name,
                        library = %library.name,
                        error = %e,
                        "library sync aborted"
                    );
                    report.libraries_failed += 1;
                }
            }
        }
        Ok(())
    }
}

fn target_prefix(site: &SiteDescriptor, library_name: &str) -> String {
    format!("{}/{}", sanitize(&site.display_name), sanitize(library_name))
}

/// Replace characters that are unsafe in path components with `_` and trim.
/// Names that trim to `.` or `..` become `_`.
pub fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .collect();
    match cleaned.trim() {
        "." | ".." => "_".to_string(),
        trimmed => trimmed.to_string(),
    }
}
