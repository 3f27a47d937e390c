use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub graph: GraphConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GraphConfig {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_login_endpoint")]
    pub login_endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_renewal_margin_secs")]
    pub token_renewal_margin_secs: u64,
}

fn default_endpoint() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}
fn default_login_endpoint() -> String {
    "https://login.microsoftonline.com".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_renewal_margin_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_auto_discover")]
    pub auto_discover: bool,
    #[serde(default)]
    pub sites: Vec<String>,
    #[serde(default)]
    pub resolve_permissions: bool,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub max_extract_bytes: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_discover: true,
            sites: Vec::new(),
            resolve_permissions: false,
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            max_extract_bytes: None,
        }
    }
}

fn default_auto_discover() -> bool {
    true
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_root")]
    pub root: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: default_output_root(),
        }
    }
}

fn default_output_root() -> PathBuf {
    PathBuf::from("RAG_DATA_ROOT")
}

/// Credential fields left empty in the file are filled from these variables.
const ENV_TENANT_ID: &str = "TENANT_ID";
const ENV_CLIENT_ID: &str = "SHAREPOINT_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "SHAREPOINT_CLIENT_SECRET";

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content, |key| std::env::var(key).ok())
}

/// Parse and validate config text. `env` resolves credential fallbacks.
pub fn parse_config(content: &str, env: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse config file")?;

    fill_from_env(&mut config.graph.tenant_id, ENV_TENANT_ID, &env);
    fill_from_env(&mut config.graph.client_id, ENV_CLIENT_ID, &env);
    fill_from_env(&mut config.graph.client_secret, ENV_CLIENT_SECRET, &env);

    validate(&config)?;
    Ok(config)
}

fn fill_from_env(field: &mut String, key: &str, env: &impl Fn(&str) -> Option<String>) {
    if field.trim().is_empty() {
        if let Some(value) = env(key) {
            *field = value;
        }
    }
}

fn validate(config: &Config) -> Result<()> {
    let graph = &config.graph;
    if graph.tenant_id.trim().is_empty() {
        anyhow::bail!("graph.tenant_id must be set (or {} in the environment)", ENV_TENANT_ID);
    }
    if graph.client_id.trim().is_empty() {
        anyhow::bail!("graph.client_id must be set (or {} in the environment)", ENV_CLIENT_ID);
    }
    if graph.client_secret.trim().is_empty() {
        anyhow::bail!(
            "graph.client_secret must be set (or {} in the environment)",
            ENV_CLIENT_SECRET
        );
    }
    if graph.timeout_secs == 0 {
        anyhow::bail!("graph.timeout_secs must be > 0");
    }

    if !config.sync.auto_discover && config.sync.sites.is_empty() {
        anyhow::bail!("sync.sites must list at least one site id when sync.auto_discover = false");
    }
    if config.sync.max_extract_bytes == Some(0) {
        anyhow::bail!("sync.max_extract_bytes must be > 0 when set");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    const MINIMAL: &str = r#"
[graph]
tenant_id = "t"
client_id = "c"
client_secret = "s"
"#;

    #[test]
    fn defaults_applied() {
        let config = parse_config(MINIMAL, no_env).unwrap();
        assert_eq!(config.graph.endpoint, "https://graph.microsoft.com/v1.0");
        assert_eq!(config.graph.token_renewal_margin_secs, 300);
        assert!(config.sync.auto_discover);
        assert!(!config.sync.resolve_permissions);
        assert_eq!(config.sync.include_globs, vec!["**/*".to_string()]);
        assert_eq!(config.output.root, PathBuf::from("RAG_DATA_ROOT"));
    }

    #[test]
    fn credentials_fall_back_to_environment() {
        let content = "[graph]\n";
        let config = parse_config(content, |key| match key {
            "TENANT_ID" => Some("tenant".to_string()),
            "SHAREPOINT_CLIENT_ID" => Some("client".to_string()),
            "SHAREPOINT_CLIENT_SECRET" => Some("secret".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.graph.tenant_id, "tenant");
        assert_eq!(config.graph.client_id, "client");
        assert_eq!(config.graph.client_secret, "secret");
    }

    #[test]
    fn missing_secret_rejected() {
        let err = parse_config("[graph]\ntenant_id = \"t\"\nclient_id = \"c\"\n", no_env)
            .unwrap_err();
        assert!(err.to_string().contains("client_secret"));
    }

    #[test]
    fn fixed_site_list_required_without_discovery() {
        let content = format!("{}\n[sync]\nauto_discover = false\n", MINIMAL);
        let err = parse_config(&content, no_env).unwrap_err();
        assert!(err.to_string().contains("sync.sites"));

        let content = format!(
            "{}\n[sync]\nauto_discover = false\nsites = [\"contoso.sharepoint.com,a,b\"]\n",
            MINIMAL
        );
        let config = parse_config(&content, no_env).unwrap();
        assert_eq!(config.sync.sites.len(), 1);
    }
}
