//! Core data models used throughout the harvester.
//!
//! These are value objects: built once, never mutated after construction, and
//! passed by reference down the site → library → folder → file pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A top-level collaboration site. Fetched once per site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteDescriptor {
    pub site_id: String,
    pub display_name: String,
    pub web_url: String,
}

/// A document library (drive) within a site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryDescriptor {
    pub id: String,
    pub name: String,
    pub drive_type: Option<String>,
    pub web_url: Option<String>,
}

/// The user attached to a created/modified stamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// Content hashes reported by the remote service for a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentHashes {
    pub quick_xor_hash: Option<String>,
    pub sha1_hash: Option<String>,
    pub sha256_hash: Option<String>,
}

/// One node (file or folder) of a library's tree.
///
/// Folders never carry content; their children are listed lazily.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteItem {
    pub id: String,
    pub name: String,
    pub is_folder: bool,
    pub size: u64,
    pub mime_type: Option<String>,
    pub created_by: Identity,
    pub created_at: Option<String>,
    pub last_modified_by: Identity,
    pub last_modified_at: Option<String>,
    pub content_hashes: Option<ContentHashes>,
    pub web_url: Option<String>,
}

/// Normalized access-control information for one file.
///
/// Identifier sets are ordered so serialized records are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicy {
    #[serde(rename = "allowedUsers")]
    pub allowed_user_ids: BTreeSet<String>,
    #[serde(rename = "allowedGroups")]
    pub allowed_group_ids: BTreeSet<String>,
    pub has_inherited_permissions: bool,
    pub is_public_within_org: bool,
    #[serde(rename = "permissionError", skip_serializing_if = "Option::is_none")]
    pub resolution_error: Option<String>,
}

impl AccessPolicy {
    /// Fail-open default used when the grant list cannot be resolved: the
    /// file is treated as inheriting its permissions (so an upstream check
    /// still applies) and is never marked public.
    pub fn unresolved(error: impl Into<String>) -> Self {
        Self {
            allowed_user_ids: BTreeSet::new(),
            allowed_group_ids: BTreeSet::new(),
            has_inherited_permissions: true,
            is_public_within_org: false,
            resolution_error: Some(error.into()),
        }
    }
}

/// The normalized per-file output handed to the record sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub file_name: String,
    pub file_extension: String,
    pub file_id: String,
    /// Library-relative path, `/`-joined, no leading slash.
    #[serde(rename = "sharePointPath")]
    pub path: String,
    pub mime_type: String,

    pub site_name: String,
    pub site_id: String,
    pub site_url: String,
    pub library_name: String,

    pub created_by: String,
    pub created_by_email: String,
    pub created_at: String,
    pub last_modified_by: String,
    pub last_modified_by_email: String,
    pub last_modified_at: String,

    pub size: u64,
    pub size_readable: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub quick_xor_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha1_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256_hash: Option<String>,

    pub synced_at: String,
    pub has_extracted_text: bool,
    #[serde(rename = "contentText", skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    #[serde(rename = "contentTextLength", skip_serializing_if = "Option::is_none")]
    pub extracted_text_length: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_policy: Option<AccessPolicy>,
}
