//! Record sinks.
//!
//! [`FsRecordSink`] writes each record as pretty-printed JSON to
//! `{root}/{path}.meta.json`. [`MemorySink`] keeps records in memory.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::SyncError;
use crate::models::DocumentRecord;
use crate::traits::RecordSink;

const RECORD_SUFFIX: &str = ".meta.json";

pub struct FsRecordSink {
    root: PathBuf,
    root_ready: OnceCell<()>,
}

impl FsRecordSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            root_ready: OnceCell::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the record for `path` lands on disk. `.` and `..` components
    /// become `_` so every target stays under the root.
    pub fn target_for(&self, path: &str) -> PathBuf {
        let mut target = self.root.clone();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            match part {
                "." | ".." => target.push("_"),
                _ => target.push(part),
            }
        }
        let mut name = target.into_os_string();
        name.push(RECORD_SUFFIX);
        PathBuf::from(name)
    }

    async fn ensure_root(&self, path: &str) -> Result<(), SyncError> {
        if self.root_ready.initialized() {
            return Ok(());
        }
        let root = self.root.clone();
        let path = path.to_string();
        self.root_ready
            .get_or_try_init(|| async move {
                tokio::fs::create_dir_all(&root)
                    .await
                    .map_err(|e| SyncError::SinkWrite {
                        path,
                        message: format!("cannot create output root {}: {}", root.display(), e),
                    })
            })
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl RecordSink for FsRecordSink {
    async fn put(&self, path: &str, record: &DocumentRecord) -> Result<(), SyncError> {
        self.ensure_root(path).await?;

        let sink_err = |message: String| SyncError::SinkWrite {
            path: path.to_string(),
            message,
        };

        let target = self.target_for(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| sink_err(e.to_string()))?;
        }

        let body = serde_json::to_vec_pretty(record).map_err(|e| sink_err(e.to_string()))?;
        tokio::fs::write(&target, body)
            .await
            .map_err(|e| sink_err(e.to_string()))?;

        debug!(target = %target.display(), "record written");
        Ok(())
    }
}

/// Collects records in insertion order.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<(String, DocumentRecord)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(String, DocumentRecord)> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn paths(&self) -> Vec<String> {
        self.records().into_iter().map(|(p, _)| p).collect()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn put(&self, path: &str, record: &DocumentRecord) -> Result<(), SyncError> {
        let mut records = self.records.lock().map_err(|e| SyncError::SinkWrite {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        records.push((path.to_string(), record.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::build_record;
    use crate::models::{RemoteItem, SiteDescriptor};

    fn record(name: &str) -> DocumentRecord {
        let item = RemoteItem {
            id: "i1".to_string(),
            name: name.to_string(),
            size: 3,
            ..Default::default()
        };
        let site = SiteDescriptor {
            site_id: "s1".to_string(),
            display_name: "Eng".to_string(),
            web_url: "https://contoso.sharepoint.com/sites/eng".to_string(),
        };
        build_record(&item, name, Some("abc".to_string()), &site, "Docs", None)
    }

    #[test]
    fn target_appends_suffix() {
        let sink = FsRecordSink::new("/out");
        assert_eq!(
            sink.target_for("Eng/Docs/folderX/file.txt"),
            PathBuf::from("/out/Eng/Docs/folderX/file.txt.meta.json")
        );
    }

    #[test]
    fn dot_components_stay_under_root() {
        let sink = FsRecordSink::new("/out");
        assert_eq!(
            sink.target_for("../../etc/./passwd"),
            PathBuf::from("/out/_/_/etc/_/passwd.meta.json")
        );
        assert!(sink.target_for("..").starts_with("/out"));
    }

    #[tokio::test]
    async fn record_for_parent_named_library_lands_inside_root() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path().join("out");
        let sink = FsRecordSink::new(&root);

        sink.put("../../escaped.txt", &record("escaped.txt"))
            .await
            .unwrap();

        assert!(root.join("_/_/escaped.txt.meta.json").is_file());
        assert!(!tmp.path().join("escaped.txt.meta.json").exists());
    }

    #[tokio::test]
    async fn writes_pretty_json_under_root() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path().join("RAG_DATA_ROOT");
        let sink = FsRecordSink::new(&root);

        sink.put("Eng/Docs/folderX/file.txt", &record("file.txt"))
            .await
            .unwrap();

        let written = root.join("Eng/Docs/folderX/file.txt.meta.json");
        let text = std::fs::read_to_string(&written).unwrap();
        assert!(text.contains('\n'));
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["fileName"], "file.txt");
        assert_eq!(json["contentText"], "abc");
    }

    #[tokio::test]
    async fn unwritable_root_is_sink_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let sink = FsRecordSink::new(blocker.join("root"));
        let err = sink.put("a/b.txt", &record("b.txt")).await.unwrap_err();
        assert!(err.is_fatal_for_library());
    }

    #[tokio::test]
    async fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.put("x/1.txt", &record("1.txt")).await.unwrap();
        sink.put("x/2.txt", &record("2.txt")).await.unwrap();
        assert_eq!(sink.paths(), vec!["x/1.txt", "x/2.txt"]);
    }
}
