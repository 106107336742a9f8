//! Resolution persistence
//!
//! Records live under `resolutions/<id>`. Every mutation goes through
//! [`ResolutionStore::update_with`], a load / mutate / conditional-write loop
//! keyed on the storage revision, so concurrent voters never overwrite each
//! other's ballots.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use coopvote_common::{MemberId, ScopeId};
use coopvote_storage::{JsonStorage, Storage, StorageError};

use crate::{BallotBook, GovernanceError, GovernanceResult, Resolution, ResolutionId};

const RESOLUTIONS_PATH: &str = "resolutions";

/// Scope-isolated resolution records
pub struct ResolutionStore {
    storage: Arc<dyn Storage>,
    max_retries: u32,
    backoff: Duration,
}

impl ResolutionStore {
    pub fn new(storage: Arc<dyn Storage>, max_retries: u32, backoff: Duration) -> Self {
        Self {
            storage,
            max_retries: max_retries.max(1),
            backoff,
        }
    }

    fn key(id: &ResolutionId) -> String {
        format!("{}/{}", RESOLUTIONS_PATH, id)
    }

    /// Persist a new resolution with an empty ballot set
    pub async fn create(
        &self,
        scope_id: ScopeId,
        title: String,
        details: String,
        duration_minutes: u32,
        proposer: Option<MemberId>,
        created_at: DateTime<Utc>,
    ) -> GovernanceResult<Resolution> {
        let resolution = Resolution {
            id: ResolutionId::new(),
            title,
            details,
            proposer,
            scope_id,
            created_at,
            duration_minutes,
            ballots: BallotBook::new(),
        };

        self.storage
            .put_json_if_revision(&Self::key(&resolution.id), None, &resolution)
            .await?;

        info!(id = %resolution.id, scope = %resolution.scope_id, "created resolution");
        Ok(resolution)
    }

    /// Look up a resolution regardless of scope
    pub async fn get(&self, id: &ResolutionId) -> GovernanceResult<Resolution> {
        match self.storage.get_json::<Resolution>(&Self::key(id)).await {
            Ok(resolution) => Ok(resolution),
            Err(StorageError::KeyNotFound(_)) => Err(GovernanceError::not_found(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a resolution owned by `scope`. A resolution of another scope is
    /// reported exactly like a missing one.
    pub async fn get_in_scope(&self, id: &ResolutionId, scope: &ScopeId) -> GovernanceResult<Resolution> {
        let resolution = self.get(id).await?;
        if &resolution.scope_id != scope {
            debug!(id = %id, scope = %scope, "resolution belongs to another scope");
            return Err(GovernanceError::not_found(id.to_string()));
        }
        Ok(resolution)
    }

    /// Every resolution of `scope`, newest first
    pub async fn list_by_scope(&self, scope: &ScopeId) -> GovernanceResult<Vec<Resolution>> {
        let keys = self.storage.list(&format!("{}/", RESOLUTIONS_PATH)).await?;

        let mut resolutions = Vec::new();
        for key in keys {
            match self.storage.get_json::<Resolution>(&key).await {
                Ok(resolution) if &resolution.scope_id == scope => resolutions.push(resolution),
                Ok(_) => {}
                Err(StorageError::KeyNotFound(_)) => continue,
                Err(e) => {
                    warn!("Skipping unreadable resolution {}: {}", key, e);
                }
            }
        }

        resolutions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(resolutions)
    }

    /// Apply `mutate` to the current state of a resolution and write it back
    /// only if nobody else wrote in between. The closure runs against a fresh
    /// copy on every attempt and may abort the update by returning an error.
    pub async fn update_with<F, T>(
        &self,
        id: &ResolutionId,
        scope: &ScopeId,
        mut mutate: F,
    ) -> GovernanceResult<(Resolution, T)>
    where
        F: FnMut(&mut Resolution) -> GovernanceResult<T> + Send,
        T: Send,
    {
        let key = Self::key(id);

        for attempt in 1..=self.max_retries {
            let current = match self.storage.get_json_with_revision::<Resolution>(&key).await {
                Ok(current) => current,
                Err(StorageError::KeyNotFound(_)) => return Err(GovernanceError::not_found(id.to_string())),
                Err(e) => return Err(e.into()),
            };
            if &current.value.scope_id != scope {
                return Err(GovernanceError::not_found(id.to_string()));
            }

            let mut resolution = current.value;
            let outcome = mutate(&mut resolution)?;

            match self
                .storage
                .put_json_if_revision(&key, Some(current.revision), &resolution)
                .await
            {
                Ok(_) => return Ok((resolution, outcome)),
                Err(StorageError::RevisionConflict { .. }) => {
                    debug!(id = %id, attempt, "concurrent update, retrying");
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.backoff * attempt).await;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(id = %id, retries = self.max_retries, "giving up after repeated update conflicts");
        Err(GovernanceError::Concurrency(format!(
            "resolution {} changed concurrently, try again",
            id
        )))
    }

    /// Remove a resolution of `scope`. Returns false when there was nothing
    /// to remove in that scope.
    pub async fn delete(&self, id: &ResolutionId, scope: &ScopeId) -> GovernanceResult<bool> {
        match self.get_in_scope(id, scope).await {
            Ok(_) => {}
            Err(GovernanceError::ResolutionNotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        }

        match self.storage.delete(&Self::key(id)).await {
            Ok(()) => {
                info!(id = %id, scope = %scope, "deleted resolution");
                Ok(true)
            }
            Err(StorageError::KeyNotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
