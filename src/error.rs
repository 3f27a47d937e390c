//! Error taxonomy for the sync pipeline.
//!
//! Every capability (token provider, catalog, drive tree, sink) returns
//! [`SyncError`]. Callers decide per variant how far a failure travels:
//!
//! | Variant | Where it stops |
//! |---------|----------------|
//! | `Transport` / `Auth` during a listing | that folder's subtree |
//! | `Transport` / `Auth` during a content fetch | that file |
//! | `Decode` | never leaves the extractor |
//! | `PermissionResolution` | folded into the record's access policy |
//! | `SinkWrite` | the enclosing library |

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Network or HTTP failure against a remote capability.
    #[error("transport error: {0}")]
    Transport(String),

    /// Token acquisition failed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Format-specific extraction failure.
    #[error("decode error: {0}")]
    Decode(String),

    /// The grant list could not be fetched or parsed.
    #[error("permission resolution failed: {0}")]
    PermissionResolution(String),

    /// The record could not be persisted.
    #[error("sink write failed for {path}: {message}")]
    SinkWrite { path: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// True for failures that indicate an environment problem rather than a
    /// per-item data problem.
    pub fn is_fatal_for_library(&self) -> bool {
        matches!(self, SyncError::SinkWrite { .. })
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        SyncError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_sink_write_escalates() {
        let sink = SyncError::SinkWrite {
            path: "a/b".to_string(),
            message: "read-only".to_string(),
        };
        assert!(sink.is_fatal_for_library());
        assert!(!SyncError::Transport("503".to_string()).is_fatal_for_library());
        assert!(!SyncError::Decode("bad zip".to_string()).is_fatal_for_library());
    }

    #[test]
    fn sink_write_message_names_path() {
        let err = SyncError::SinkWrite {
            path: "Site/Docs/a.txt".to_string(),
            message: "permission denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "sink write failed for Site/Docs/a.txt: permission denied"
        );
    }
}
