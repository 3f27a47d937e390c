//! Depth-first traversal of one library.
//!
//! The walk keeps an explicit stack of folder frames. Each frame owns the
//! not-yet-visited children of one folder, so items come out in the same
//! pre-order a recursive walk would produce without growing the call stack.
//!
//! Failure boundaries:
//!
//! | Failure | Effect |
//! |---------|--------|
//! | folder listing | that folder's subtree is skipped |
//! | content fetch | that file is skipped |
//! | extraction | record written without text |
//! | permission fetch | record written with the fail-open policy |
//! | sink write | the walk stops and the error is returned |

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::ops::AddAssign;
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::extract;
use crate::metadata::build_record;
use crate::models::{LibraryDescriptor, RemoteItem, SiteDescriptor};
use crate::permissions::resolve_policy;
use crate::traits::{DriveTree, RecordSink};

/// Counters for one walk (or the sum of several).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub folders: usize,
    pub files: usize,
    pub records_written: usize,
    pub folders_failed: usize,
    pub files_failed: usize,
}

impl AddAssign for WalkStats {
    fn add_assign(&mut self, other: Self) {
        self.folders += other.folders;
        self.files += other.files;
        self.records_written += other.records_written;
        self.folders_failed += other.folders_failed;
        self.files_failed += other.files_failed;
    }
}

/// Include/exclude globs matched against the library-relative path.
#[derive(Debug, Clone)]
pub struct PathFilter {
    include: GlobSet,
    exclude: GlobSet,
}

impl PathFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, SyncError> {
        Ok(Self {
            include: build_globset(include)?,
            exclude: build_globset(exclude)?,
        })
    }

    /// Matches every path.
    pub fn allow_all() -> Self {
        Self {
            include: GlobSet::empty(),
            exclude: GlobSet::empty(),
        }
    }

    pub fn allows(&self, path: &str) -> bool {
        (self.include.is_empty() || self.include.is_match(path)) && !self.exclude.is_match(path)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, SyncError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| SyncError::Config(format!("invalid glob {:?}: {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| SyncError::Config(format!("invalid glob set: {}", e)))
}

#[derive(Debug, Clone)]
pub struct WalkOptions {
    pub resolve_permissions: bool,
    pub filter: PathFilter,
    /// Files larger than this are recorded without downloading content.
    pub max_extract_bytes: Option<u64>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            resolve_permissions: false,
            filter: PathFilter::allow_all(),
            max_extract_bytes: None,
        }
    }
}

/// The library being walked and where its records go.
pub struct LibraryContext<'a> {
    pub site: &'a SiteDescriptor,
    pub library: &'a LibraryDescriptor,
    /// Sink path prefix, `{site}/{library}` after sanitizing.
    pub target_prefix: String,
}

struct Frame {
    path: String,
    children: std::vec::IntoIter<RemoteItem>,
}

pub struct TreeWalker<'a> {
    tree: &'a dyn DriveTree,
    sink: &'a dyn RecordSink,
    options: &'a WalkOptions,
}

impl<'a> TreeWalker<'a> {
    pub fn new(tree: &'a dyn DriveTree, sink: &'a dyn RecordSink, options: &'a WalkOptions) -> Self {
        Self {
            tree,
            sink,
            options,
        }
    }

    /// Walk the library rooted at `ctx.library`.
    ///
    /// Only a sink failure is returned as an error; everything else is
    /// counted in the stats and logged.
    pub async fn walk(&self, ctx: &LibraryContext<'_>) -> Result<WalkStats, SyncError> {
        let site_id = ctx.site.site_id.as_str();
        let drive_id = ctx.library.id.as_str();
        let mut stats = WalkStats::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut stack: Vec<Frame> = Vec::new();

        match self.tree.list_children(site_id, drive_id, None).await {
            Ok(children) => stack.push(Frame {
                path: String::new(),
                children: children.into_iter(),
            }),
            Err(e) => {
                warn!(library = %ctx.library.name, error = %e, "failed to list library root");
                stats.folders_failed += 1;
                return Ok(stats);
            }
        }

        loop {
            let (item, path) = {
                let Some(frame) = stack.last_mut() else {
                    break;
                };
                match frame.children.next() {
                    Some(item) => {
                        let path = join_path(&frame.path, &item.name);
                        (item, path)
                    }
                    None => {
                        stack.pop();
                        continue;
                    }
                }
            };

            if !visited.insert(item.id.clone()) {
                debug!(path = %path, "already visited, skipping");
                continue;
            }

            if item.is_folder {
                stats.folders += 1;
                match self.tree.list_children(site_id, drive_id, Some(&item.id)).await {
                    Ok(children) => stack.push(Frame {
                        path,
                        children: children.into_iter(),
                    }),
                    Err(e) => {
                        warn!(folder = %path, error = %e, "failed to list folder, skipping subtree");
                        stats.folders_failed += 1;
                    }
                }
                continue;
            }

            if !self.options.filter.allows(&path) {
                debug!(path = %path, "excluded by filter");
                continue;
            }

            stats.files += 1;
            match self.process_file(ctx, &item, &path).await {
                Ok(()) => stats.records_written += 1,
                Err(e) if e.is_fatal_for_library() => return Err(e),
                Err(e) => {
                    warn!(file = %path, error = %e, "failed to process file");
                    stats.files_failed += 1;
                }
            }
        }

        Ok(stats)
    }

    async fn process_file(
        &self,
        ctx: &LibraryContext<'_>,
        item: &RemoteItem,
        path: &str,
    ) -> Result<(), SyncError> {
        let site_id = ctx.site.site_id.as_str();
        let drive_id = ctx.library.id.as_str();

        let too_large = self
            .options
            .max_extract_bytes
            .is_some_and(|limit| item.size > limit);

        let text = if too_large {
            debug!(file = %path, size = item.size, "over size limit, content not fetched");
            None
        } else {
            let bytes = self.tree.content(site_id, drive_id, &item.id).await?;
            extract::extract(&item.name, &bytes)
        };

        let access_policy = if self.options.resolve_permissions {
            Some(resolve_policy(
                self.tree.permissions(site_id, drive_id, &item.id).await,
            ))
        } else {
            None
        };

        let record = build_record(
            item,
            path,
            text,
            ctx.site,
            &ctx.library.name,
            access_policy,
        );
        let target = join_path(&ctx.target_prefix, path);
        self.sink.put(&target, &record).await?;
        debug!(target = %target, has_text = record.has_extracted_text, "record stored");
        Ok(())
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_has_no_leading_slash() {
        assert_eq!(join_path("", "file.txt"), "file.txt");
        assert_eq!(join_path("folderX", "file.txt"), "folderX/file.txt");
        assert_eq!(join_path("a/b", "c"), "a/b/c");
    }

    #[test]
    fn filter_include_and_exclude() {
        let filter = PathFilter::new(
            &["**/*".to_string()],
            &["**/*.tmp".to_string(), "Archive/**".to_string()],
        )
        .unwrap();
        assert!(filter.allows("report.docx"));
        assert!(filter.allows("folderX/file.txt"));
        assert!(!filter.allows("folderX/scratch.tmp"));
        assert!(!filter.allows("Archive/2019/old.pdf"));
    }

    #[test]
    fn filter_include_restricts() {
        let filter = PathFilter::new(&["**/*.pdf".to_string()], &[]).unwrap();
        assert!(filter.allows("a/b/c.pdf"));
        assert!(!filter.allows("a/b/c.docx"));
        assert!(PathFilter::allow_all().allows("anything"));
    }

    #[test]
    fn invalid_glob_is_config_error() {
        let err = PathFilter::new(&["a[".to_string()], &[]).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn stats_add() {
        let mut total = WalkStats {
            files: 2,
            ..Default::default()
        };
        total += WalkStats {
            files: 1,
            folders_failed: 1,
            ..Default::default()
        };
        assert_eq!(total.files, 3);
        assert_eq!(total.folders_failed, 1);
    }
}
