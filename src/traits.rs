//! Capability traits for the remote service and the output side.
//!
//! The sync pipeline only talks to these traits. [`crate::graph::GraphClient`]
//! implements the remote ones over REST; tests substitute in-memory fakes.
//!
//! ```text
//! ┌───────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ TokenProvider │──▶│ SiteCatalog  │   │  RecordSink  │
//! └───────────────┘   │ DriveTree    │──▶│ (fs, memory) │
//!                     │ GroupResolver│   └──────────────┘
//!                     └──────────────┘
//! ```
//!
//! Every method returns [`SyncError`]; the caller decides how far a failure
//! travels.

use async_trait::async_trait;

use crate::error::SyncError;
use crate::models::{DocumentRecord, LibraryDescriptor, RemoteItem, SiteDescriptor};
use crate::permissions::RawGrant;

/// Supplies bearer tokens for the remote API.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, SyncError>;
}

/// Site enumeration and lookup.
#[async_trait]
pub trait SiteCatalog: Send + Sync {
    /// Enumerate collaboration and team sites (personal and root sites are
    /// filtered out).
    async fn discover_sites(&self) -> Result<Vec<String>, SyncError>;

    async fn site_info(&self, site_id: &str) -> Result<SiteDescriptor, SyncError>;
}

/// Library and folder-tree access within a site.
#[async_trait]
pub trait DriveTree: Send + Sync {
    async fn list_libraries(&self, site_id: &str) -> Result<Vec<LibraryDescriptor>, SyncError>;

    /// List the children of `folder_id`, or of the library root when `None`.
    async fn list_children(
        &self,
        site_id: &str,
        drive_id: &str,
        folder_id: Option<&str>,
    ) -> Result<Vec<RemoteItem>, SyncError>;

    async fn content(
        &self,
        site_id: &str,
        drive_id: &str,
        item_id: &str,
    ) -> Result<Vec<u8>, SyncError>;

    async fn permissions(
        &self,
        site_id: &str,
        drive_id: &str,
        item_id: &str,
    ) -> Result<Vec<RawGrant>, SyncError>;
}

/// Directory lookups used to expand group grants at query time.
#[async_trait]
pub trait DirectoryGroupResolver: Send + Sync {
    /// Transitive group memberships of a user: group ids plus lower-cased
    /// group mail addresses.
    async fn user_groups(&self, user_principal: &str) -> Result<Vec<String>, SyncError>;
}

/// Destination for finished records.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persist `record` under `path` (`{site}/{library}/{document path}`).
    async fn put(&self, path: &str, record: &DocumentRecord) -> Result<(), SyncError>;
}
