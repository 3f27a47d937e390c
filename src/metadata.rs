//! Per-file record construction.
//!
//! Pure composition of a [`RemoteItem`], its site/library context, extracted
//! text, and optional access policy into a [`DocumentRecord`]. No I/O.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::{AccessPolicy, DocumentRecord, RemoteItem, SiteDescriptor};

const UNKNOWN: &str = "Unknown";

/// Build the record for `item`, stamped with the current instant.
pub fn build_record(
    item: &RemoteItem,
    path: &str,
    extracted_text: Option<String>,
    site: &SiteDescriptor,
    library_name: &str,
    access_policy: Option<AccessPolicy>,
) -> DocumentRecord {
    build_record_at(
        item,
        path,
        extracted_text,
        site,
        library_name,
        access_policy,
        Utc::now(),
    )
}

/// Same as [`build_record`] with an explicit sync timestamp.
pub fn build_record_at(
    item: &RemoteItem,
    path: &str,
    extracted_text: Option<String>,
    site: &SiteDescriptor,
    library_name: &str,
    access_policy: Option<AccessPolicy>,
    synced_at: DateTime<Utc>,
) -> DocumentRecord {
    let extracted_text = extracted_text.filter(|t| !t.is_empty());
    let hashes = item.content_hashes.clone().unwrap_or_default();

    DocumentRecord {
        file_name: item.name.clone(),
        file_extension: file_extension(&item.name),
        file_id: item.id.clone(),
        path: path.to_string(),
        mime_type: item
            .mime_type
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),

        site_name: site.display_name.clone(),
        site_id: site.site_id.clone(),
        site_url: site.web_url.clone(),
        library_name: library_name.to_string(),

        created_by: or_unknown(&item.created_by.display_name),
        created_by_email: or_unknown(&item.created_by.email),
        created_at: or_unknown(&item.created_at),
        last_modified_by: or_unknown(&item.last_modified_by.display_name),
        last_modified_by_email: or_unknown(&item.last_modified_by.email),
        last_modified_at: or_unknown(&item.last_modified_at),

        size: item.size,
        size_readable: format_bytes(item.size),
        web_url: item.web_url.clone(),

        quick_xor_hash: hashes.quick_xor_hash,
        sha1_hash: hashes.sha1_hash,
        sha256_hash: hashes.sha256_hash,

        synced_at: synced_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        has_extracted_text: extracted_text.is_some(),
        extracted_text_length: extracted_text.as_ref().map(|t| t.chars().count()),
        extracted_text,

        access_policy,
    }
}

fn or_unknown(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| UNKNOWN.to_string())
}

/// Lower-cased suffix after the last `.`, or `""` when the name has none.
pub fn file_extension(name: &str) -> String {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

/// Human-readable byte size: `1536` → `"1.50 KB"`.
pub fn format_bytes(size: u64) -> String {
    let mut value = size as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if value < 1024.0 {
            return format!("{:.2} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.2} PB", value)
}
