//! Handlers behind the `harvest` subcommands.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::auth::ClientCredentialsTokenProvider;
use crate::config::Config;
use crate::extract::{self, FileFormat};
use crate::graph::GraphClient;
use crate::sink::FsRecordSink;
use crate::sync::{SiteSource, SiteSyncOrchestrator, SyncReport};
use crate::traits::{DirectoryGroupResolver, SiteCatalog};
use crate::walker::{PathFilter, WalkOptions};

/// Per-invocation overrides for `harvest sync`.
#[derive(Debug, Default)]
pub struct SyncOverrides {
    pub sites: Vec<String>,
    pub resolve_permissions: bool,
    pub output: Option<PathBuf>,
}

pub fn graph_client(config: &Config) -> Result<Arc<GraphClient>> {
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.graph.timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;
    let tokens = Arc::new(ClientCredentialsTokenProvider::new(http.clone(), &config.graph));
    let client = GraphClient::with_http(http, &config.graph.endpoint, tokens)?;
    Ok(Arc::new(client))
}

/// Pick the site source: explicit ids win, then the configured list when
/// discovery is off, else discovery.
pub fn site_source(config: &Config, overrides: &SyncOverrides) -> SiteSource {
    if !overrides.sites.is_empty() {
        SiteSource::Fixed(overrides.sites.clone())
    } else if !config.sync.auto_discover {
        SiteSource::Fixed(config.sync.sites.clone())
    } else {
        SiteSource::Discover
    }
}

pub fn walk_options(config: &Config, overrides: &SyncOverrides) -> Result<WalkOptions> {
    let filter = PathFilter::new(&config.sync.include_globs, &config.sync.exclude_globs)?;
    Ok(WalkOptions {
        resolve_permissions: config.sync.resolve_permissions || overrides.resolve_permissions,
        filter,
        max_extract_bytes: config.sync.max_extract_bytes,
    })
}

pub async fn run_sync(config: &Config, overrides: SyncOverrides) -> Result<()> {
    let client = graph_client(config)?;
    let root = overrides
        .output
        .clone()
        .unwrap_or_else(|| config.output.root.clone());
    let sink = Arc::new(FsRecordSink::new(&root));

    let orchestrator = SiteSyncOrchestrator::new(
        client.clone(),
        client,
        sink,
        walk_options(config, &overrides)?,
    );
    let report = orchestrator
        .sync_all(site_source(config, &overrides))
        .await
        .context("Sync failed")?;

    print_report(&report, &root);
    Ok(())
}

fn print_report(report: &SyncReport, root: &Path) {
    let totals = &report.totals;
    println!("Sync complete");
    println!("=============");
    println!("  Output:      {}", root.display());
    println!(
        "  Sites:       {} synced, {} failed",
        report.sites_synced, report.sites_failed
    );
    println!(
        "  Libraries:   {} synced, {} failed",
        report.libraries_synced, report.libraries_failed
    );
    println!(
        "  Folders:     {} ({} failed)",
        totals.folders, totals.folders_failed
    );
    println!("  Files:       {} ({} failed)", totals.files, totals.files_failed);
    println!("  Records:     {}", totals.records_written);
}

pub async fn list_sites(config: &Config) -> Result<()> {
    let client = graph_client(config)?;
    let ids = client.discover_sites().await.context("Site discovery failed")?;

    println!("{:<40} {}", "SITE", "URL");
    for id in ids {
        match client.site_info(&id).await {
            Ok(site) => println!("{:<40} {}", site.display_name, site.web_url),
            Err(e) => println!("{:<40} (error: {})", id, e),
        }
    }
    Ok(())
}

pub async fn show_groups(config: &Config, user_principal: &str) -> Result<()> {
    let client = graph_client(config)?;
    let groups = client
        .user_groups(user_principal)
        .await
        .with_context(|| format!("Failed to resolve groups for {}", user_principal))?;

    for group in &groups {
        println!("{}", group);
    }
    eprintln!("{} belongs to {} group identifiers", user_principal, groups.len());
    Ok(())
}

pub fn extract_file(path: &Path) -> Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let format = FileFormat::from_name(&name);
    if !format.is_supported() {
        anyhow::bail!("Unsupported file type: {}", name);
    }

    let text = extract::try_extract(format, &bytes)
        .with_context(|| format!("Failed to extract {}", path.display()))?;
    match text.filter(|t| !t.is_empty()) {
        Some(text) => println!("{}", text),
        None => eprintln!("No text extracted from {}", path.display()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    fn config(sync_section: &str) -> Config {
        let content = format!(
            "[graph]\ntenant_id = \"t\"\nclient_id = \"c\"\nclient_secret = \"s\"\n{}",
            sync_section
        );
        parse_config(&content, |_| None).unwrap()
    }

    #[test]
    fn cli_sites_override_discovery() {
        let cfg = config("");
        let overrides = SyncOverrides {
            sites: vec!["a".to_string()],
            ..Default::default()
        };
        assert_eq!(
            site_source(&cfg, &overrides),
            SiteSource::Fixed(vec!["a".to_string()])
        );
        assert_eq!(site_source(&cfg, &SyncOverrides::default()), SiteSource::Discover);
    }

    #[test]
    fn configured_sites_used_without_discovery() {
        let cfg = config("[sync]\nauto_discover = false\nsites = [\"x\", \"y\"]\n");
        assert_eq!(
            site_source(&cfg, &SyncOverrides::default()),
            SiteSource::Fixed(vec!["x".to_string(), "y".to_string()])
        );
    }

    #[test]
    fn permission_flag_enables_resolution() {
        let cfg = config("");
        assert!(!walk_options(&cfg, &SyncOverrides::default()).unwrap().resolve_permissions);
        let overrides = SyncOverrides {
            resolve_permissions: true,
            ..Default::default()
        };
        assert!(walk_options(&cfg, &overrides).unwrap().resolve_permissions);
    }

    #[test]
    fn extract_file_reads_plain_text() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("notes.md");
        std::fs::write(&path, "# Title\n").unwrap();
        extract_file(&path).unwrap();

        let other = tmp.path().join("image.png");
        std::fs::write(&other, [0u8, 1, 2]).unwrap();
        assert!(extract_file(&other).is_err());
    }
}
