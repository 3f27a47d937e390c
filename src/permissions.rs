//! Permission normalization.
//!
//! Flattens the heterogeneous grant shapes returned by the permissions
//! endpoint into one [`AccessPolicy`]:
//!
//! - sharing links scoped to `anonymous` or `organization` mark the file
//!   public within the org and are otherwise ignored;
//! - `grantedToV2` grants contribute a user email and/or group id and email;
//! - legacy `grantedTo` grants contribute a user email;
//! - any grant with `inheritedFrom`, or an empty grant list, marks the
//!   policy as inherited.
//!
//! Emails are lower-cased. Both identifier sets are deduplicated.

use serde::Deserialize;

use crate::error::SyncError;
use crate::models::AccessPolicy;

/// One raw permission entry as returned by the remote service.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGrant {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub link: Option<SharingLink>,
    #[serde(default, rename = "grantedToV2")]
    pub granted_to_v2: Option<GrantedTo>,
    #[serde(default)]
    pub granted_to: Option<GrantedTo>,
    /// Set to a non-empty reference when the grant is inherited from an
    /// ancestor. Empty, zero and `false` values do not count.
    #[serde(default)]
    pub inherited_from: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SharingLink {
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default, rename = "type")]
    pub link_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GrantedTo {
    #[serde(default)]
    pub user: Option<Principal>,
    #[serde(default)]
    pub group: Option<Principal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl SharingLink {
    fn is_org_wide(&self) -> bool {
        matches!(self.scope.as_deref(), Some("anonymous" | "organization"))
    }
}

impl RawGrant {
    fn is_inherited(&self) -> bool {
        use serde_json::Value;

        match &self.inherited_from {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::Object(map)) => !map.is_empty(),
        }
    }
}

fn user_email(granted: &GrantedTo) -> Option<&str> {
    granted
        .user
        .as_ref()
        .and_then(|u| u.email.as_deref())
        .filter(|e| !e.is_empty())
}

/// Normalize a grant list into an [`AccessPolicy`].
pub fn normalize(grants: &[RawGrant]) -> AccessPolicy {
    let mut policy = AccessPolicy::default();

    for grant in grants {
        if grant.link.as_ref().is_some_and(SharingLink::is_org_wide) {
            policy.is_public_within_org = true;
            continue;
        }

        if let Some(granted) = &grant.granted_to_v2 {
            if let Some(email) = user_email(granted) {
                policy.allowed_user_ids.insert(email.to_lowercase());
            }
            if let Some(group) = &granted.group {
                if let Some(id) = group.id.as_deref().filter(|id| !id.is_empty()) {
                    policy.allowed_group_ids.insert(id.to_string());
                }
                if let Some(email) = group.email.as_deref().filter(|e| !e.is_empty()) {
                    policy.allowed_group_ids.insert(email.to_lowercase());
                }
            }
        } else if let Some(granted) = &grant.granted_to {
            if let Some(email) = user_email(granted) {
                policy.allowed_user_ids.insert(email.to_lowercase());
            }
        }
    }

    policy.has_inherited_permissions =
        grants.is_empty() || grants.iter().any(RawGrant::is_inherited);
    policy
}

/// Map the outcome of a grant fetch to a policy, falling back to
/// [`AccessPolicy::unresolved`] on failure.
pub fn resolve_policy(fetched: Result<Vec<RawGrant>, SyncError>) -> AccessPolicy {
    match fetched {
        Ok(grants) => normalize(&grants),
        Err(e) => {
            let err = match e {
                SyncError::PermissionResolution(_) => e,
                other => SyncError::PermissionResolution(other.to_string()),
            };
            AccessPolicy::unresolved(err.to_string())
        }
    }
}
