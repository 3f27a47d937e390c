//! REST client for the Graph v1.0 API.
//!
//! [`GraphClient`] implements [`SiteCatalog`], [`DriveTree`] and
//! [`DirectoryGroupResolver`]. Every collection endpoint is paged by
//! following `@odata.nextLink` until it is absent. Requests are issued one at
//! a time; no retries.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::error::SyncError;
use crate::models::{
    ContentHashes, Identity, LibraryDescriptor, RemoteItem, SiteDescriptor,
};
use crate::permissions::RawGrant;
use crate::traits::{DirectoryGroupResolver, DriveTree, SiteCatalog, TokenProvider};

const UNKNOWN: &str = "Unknown";

#[derive(Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl GraphClient {
    /// `endpoint` is the API root, e.g. `https://graph.microsoft.com/v1.0`.
    pub fn with_http(
        http: reqwest::Client,
        endpoint: &str,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, SyncError> {
        let base_url = endpoint.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(SyncError::Config("graph endpoint must not be empty".to_string()));
        }
        Url::parse(&base_url)
            .map_err(|e| SyncError::Config(format!("invalid graph endpoint {}: {}", base_url, e)))?;
        Ok(Self {
            http,
            base_url,
            tokens,
        })
    }

    fn url_with_segments(&self, segments: &[&str]) -> Result<Url, SyncError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SyncError::Config(format!("invalid graph endpoint: {}", e)))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| SyncError::Config("graph endpoint must be an absolute URL".to_string()))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn send(&self, url: Url) -> Result<reqwest::Response, SyncError> {
        let token = self.tokens.token().await?;
        debug!(url = %url, "GET");
        let response = self.http.get(url.clone()).bearer_auth(token).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = format!("GET {} failed ({}): {}", url.path(), status, body);
        Err(match status {
            StatusCode::UNAUTHORIZED => SyncError::Auth(message),
            _ => SyncError::Transport(message),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, SyncError> {
        let response = self.send(url).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| SyncError::Transport(format!("invalid response body: {}", e)))
    }

    /// Fetch every page of a collection.
    async fn get_collection<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, SyncError> {
        let mut items = Vec::new();
        let mut next = Some(url);

        while let Some(url) = next.take() {
            let page: Page<T> = self.get_json(url).await?;
            items.extend(page.value);
            next = match page.next_link {
                Some(link) => Some(Url::parse(&link).map_err(|e| {
                    SyncError::Transport(format!("invalid @odata.nextLink {}: {}", link, e))
                })?),
                None => None,
            };
        }

        Ok(items)
    }
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphSite {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    web_url: Option<String>,
}

impl GraphSite {
    fn is_collaboration_site(&self) -> bool {
        self.web_url
            .as_deref()
            .is_some_and(|url| url.contains("/sites/") || url.contains("/teams/"))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphDrive {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    drive_type: Option<String>,
    #[serde(default)]
    web_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphDriveItem {
    id: String,
    name: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    web_url: Option<String>,
    #[serde(default)]
    created_date_time: Option<String>,
    #[serde(default)]
    last_modified_date_time: Option<String>,
    #[serde(default)]
    created_by: Option<GraphIdentitySet>,
    #[serde(default)]
    last_modified_by: Option<GraphIdentitySet>,
    #[serde(default)]
    file: Option<GraphFile>,
    #[serde(default)]
    folder: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphFile {
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    hashes: Option<ContentHashes>,
}

#[derive(Debug, Deserialize)]
struct GraphIdentitySet {
    #[serde(default)]
    user: Option<GraphIdentity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphIdentity {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphGroup {
    id: String,
    #[serde(default)]
    mail: Option<String>,
}

fn identity(set: Option<GraphIdentitySet>) -> Identity {
    match set.and_then(|s| s.user) {
        Some(user) => Identity {
            display_name: user.display_name,
            email: user.email,
        },
        None => Identity::default(),
    }
}

impl From<GraphDriveItem> for RemoteItem {
    fn from(item: GraphDriveItem) -> Self {
        let (mime_type, content_hashes) = match item.file {
            Some(file) => (file.mime_type, file.hashes),
            None => (None, None),
        };
        RemoteItem {
            id: item.id,
            name: item.name,
            is_folder: item.folder.is_some(),
            size: item.size.unwrap_or(0),
            mime_type,
            created_by: identity(item.created_by),
            created_at: item.created_date_time,
            last_modified_by: identity(item.last_modified_by),
            last_modified_at: item.last_modified_date_time,
            content_hashes,
            web_url: item.web_url,
        }
    }
}

#[async_trait]
impl SiteCatalog for GraphClient {
    async fn discover_sites(&self) -> Result<Vec<String>, SyncError> {
        let mut url = self.url_with_segments(&["sites"])?;
        url.query_pairs_mut().append_pair("search", "*");

        let sites: Vec<GraphSite> = self.get_collection(url).await?;
        let total = sites.len();
        let ids: Vec<String> = sites
            .into_iter()
            .filter(GraphSite::is_collaboration_site)
            .filter_map(|s| s.id)
            .collect();
        debug!(total, kept = ids.len(), "site discovery");
        Ok(ids)
    }

    async fn site_info(&self, site_id: &str) -> Result<SiteDescriptor, SyncError> {
        let url = self.url_with_segments(&["sites", site_id])?;
        let site: GraphSite = self.get_json(url).await?;
        Ok(SiteDescriptor {
            site_id: site.id.unwrap_or_else(|| UNKNOWN.to_string()),
            display_name: site.display_name.unwrap_or_else(|| UNKNOWN.to_string()),
            web_url: site.web_url.unwrap_or_else(|| UNKNOWN.to_string()),
        })
    }
}

#[async_trait]
impl DriveTree for GraphClient {
    async fn list_libraries(&self, site_id: &str) -> Result<Vec<LibraryDescriptor>, SyncError> {
        let url = self.url_with_segments(&["sites", site_id, "drives"])?;
        let drives: Vec<GraphDrive> = self.get_collection(url).await?;
        Ok(drives
            .into_iter()
            .map(|d| LibraryDescriptor {
                name: d.name.unwrap_or_else(|| d.id.clone()),
                id: d.id,
                drive_type: d.drive_type,
                web_url: d.web_url,
            })
            .collect())
    }

    async fn list_children(
        &self,
        site_id: &str,
        drive_id: &str,
        folder_id: Option<&str>,
    ) -> Result<Vec<RemoteItem>, SyncError> {
        let url = match folder_id {
            Some(id) => self.url_with_segments(&[
                "sites", site_id, "drives", drive_id, "items", id, "children",
            ])?,
            None => {
                self.url_with_segments(&["sites", site_id, "drives", drive_id, "root", "children"])?
            }
        };
        let items: Vec<GraphDriveItem> = self.get_collection(url).await?;
        Ok(items.into_iter().map(RemoteItem::from).collect())
    }

    async fn content(
        &self,
        site_id: &str,
        drive_id: &str,
        item_id: &str,
    ) -> Result<Vec<u8>, SyncError> {
        let url = self.url_with_segments(&[
            "sites", site_id, "drives", drive_id, "items", item_id, "content",
        ])?;
        let response = self.send(url).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn permissions(
        &self,
        site_id: &str,
        drive_id: &str,
        item_id: &str,
    ) -> Result<Vec<RawGrant>, SyncError> {
        let url = self.url_with_segments(&[
            "sites", site_id, "drives", drive_id, "items", item_id, "permissions",
        ])?;
        self.get_collection(url)
            .await
            .map_err(|e| SyncError::PermissionResolution(e.to_string()))
    }
}

#[async_trait]
impl DirectoryGroupResolver for GraphClient {
    async fn user_groups(&self, user_principal: &str) -> Result<Vec<String>, SyncError> {
        let url = self.url_with_segments(&[
            "users",
            user_principal,
            "transitiveMemberOf",
            "microsoft.graph.group",
        ])?;
        let groups: Vec<GraphGroup> = self.get_collection(url).await?;

        let mut out = Vec::with_capacity(groups.len() * 2);
        for group in groups {
            out.push(group.id);
            if let Some(mail) = group.mail.filter(|m| !m.is_empty()) {
                out.push(mail.to_lowercase());
            }
        }
        Ok(out)
    }
}
