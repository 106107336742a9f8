//! Member directory
//!
//! The roster of each cooperative. The voting core uses it to validate proxy
//! targets and to list members who have not voted.

use std::sync::Arc;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use coopvote_common::{MemberId, ScopeId};
use coopvote_storage::{JsonStorage, Storage, StorageError};

use crate::{IdentityError, IdentityResult, Role};

/// A member of a cooperative
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: MemberId,
    pub scope_id: ScopeId,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub role: Role,
}

impl Member {
    /// Build a member from a single display name, split at the first space
    pub fn from_display_name(id: MemberId, scope_id: ScopeId, display_name: &str, role: Role) -> Self {
        let display_name = display_name.trim();
        let (first_name, last_name) = match display_name.split_once(' ') {
            Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
            None => (display_name.to_string(), String::new()),
        };

        Self {
            id,
            scope_id,
            first_name,
            last_name,
            role,
        }
    }

    /// "<given> <surname>"
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Source of cooperative rosters
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    /// Every member of the scope, administrators included
    async fn scope_members(&self, scope: &ScopeId) -> IdentityResult<Vec<Member>>;

    /// Look up one member of the scope
    async fn find_member(&self, scope: &ScopeId, id: &MemberId) -> IdentityResult<Option<Member>>;

    /// Members who may vote and act as proxies, ordered by surname then given name
    async fn eligible_members(&self, scope: &ScopeId) -> IdentityResult<Vec<Member>> {
        let mut members: Vec<Member> = self
            .scope_members(scope)
            .await?
            .into_iter()
            .filter(|m| !m.is_admin())
            .collect();
        members.sort_by(|a, b| {
            a.last_name
                .cmp(&b.last_name)
                .then_with(|| a.first_name.cmp(&b.first_name))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(members)
    }
}

/// Member directory kept in the shared storage layer
pub struct MemberRegistry {
    /// Underlying storage
    storage: Arc<dyn Storage>,
    /// Prefix for member keys
    prefix: String,
}

impl MemberRegistry {
    /// Create a new registry over `storage`
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            prefix: "members".to_string(),
        }
    }

    fn scope_prefix(&self, scope: &ScopeId) -> String {
        format!("{}/{}/", self.prefix, scope)
    }

    fn member_key(&self, scope: &ScopeId, id: &MemberId) -> String {
        format!("{}/{}/{}", self.prefix, scope, id)
    }

    /// Insert or replace a member record
    pub async fn register(&self, member: &Member) -> IdentityResult<()> {
        let key = self.member_key(&member.scope_id, &member.id);
        self.storage.put_json(&key, member).await?;
        info!(member = %member.id, scope = %member.scope_id, "registered member");
        Ok(())
    }

    /// Register `member` unless the scope already knows it. Returns whether a
    /// record was created.
    pub async fn ensure_member(&self, member: &Member) -> IdentityResult<bool> {
        let key = self.member_key(&member.scope_id, &member.id);
        match self.storage.put_json_if_revision(&key, None, member).await {
            Ok(_) => {
                info!(member = %member.id, scope = %member.scope_id, "registered member on first contact");
                Ok(true)
            }
            Err(StorageError::RevisionConflict { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl MemberDirectory for MemberRegistry {
    async fn scope_members(&self, scope: &ScopeId) -> IdentityResult<Vec<Member>> {
        let keys = self.storage.list(&self.scope_prefix(scope)).await?;

        let mut members = Vec::with_capacity(keys.len());
        for key in keys {
            match self.storage.get_json::<Member>(&key).await {
                Ok(member) => members.push(member),
                // Deleted between list and get
                Err(StorageError::KeyNotFound(_)) => continue,
                Err(e) => {
                    warn!("Skipping unreadable member record {}: {}", key, e);
                }
            }
        }

        debug!(scope = %scope, count = members.len(), "loaded roster");
        Ok(members)
    }

    async fn find_member(&self, scope: &ScopeId, id: &MemberId) -> IdentityResult<Option<Member>> {
        let key = self.member_key(scope, id);
        match self.storage.get_json::<Member>(&key).await {
            Ok(member) => Ok(Some(member)),
            Err(StorageError::KeyNotFound(_)) => Ok(None),
            Err(StorageError::DeserializationError(e)) => Err(IdentityError::InvalidMemberData(e)),
            Err(e) => Err(e.into()),
        }
    }
}
