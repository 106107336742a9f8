//! Voting service
//!
//! The operation boundary. Every method takes the caller's context first,
//! checks scope and capability before touching storage, and logs domain
//! failures at `warn` and internal ones at `error`.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info, warn};

use coopvote_common::validation::{validate_non_empty, validate_range};
use coopvote_common::{Clock, MemberId, ScopeId, VotingConfig};
use coopvote_identity::{can_manage_resolutions, CallerContext, MemberDirectory};
use coopvote_storage::Storage;

use crate::ballots::{apply_vote, VoteCommand};
use crate::delegation::DelegationResolver;
use crate::lifecycle::{self, ResolutionListing};
use crate::tally::{self, DetailEntry, Tally};
use crate::{ErrorKind, GovernanceError, GovernanceResult, Resolution, ResolutionId, ResolutionStore, VoteOption};

/// Create/edit payload. Fields are optional so that missing ones can be
/// reported instead of defaulted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionDraft {
    pub title: Option<String>,
    pub details: Option<String>,
    pub proposer: Option<String>,
    pub duration_minutes: Option<i64>,
}

impl ResolutionDraft {
    pub fn new(title: impl Into<String>, duration_minutes: i64) -> Self {
        Self {
            title: Some(title.into()),
            duration_minutes: Some(duration_minutes),
            ..Default::default()
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_proposer(mut self, proposer: impl Into<String>) -> Self {
        self.proposer = Some(proposer.into());
        self
    }
}

/// Draft after validation
struct ValidDraft {
    title: String,
    details: String,
    proposer: Option<MemberId>,
    duration_minutes: u32,
}

/// Ballot request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub option: String,
    pub delegate_to: Option<String>,
}

impl VoteRequest {
    pub fn direct(option: impl Into<String>) -> Self {
        Self {
            option: option.into(),
            delegate_to: None,
        }
    }

    pub fn delegated(option: impl Into<String>, delegate_to: impl Into<String>) -> Self {
        Self {
            option: option.into(),
            delegate_to: Some(delegate_to.into()),
        }
    }
}

/// Resolution voting for all cooperatives sharing one store
pub struct VotingService {
    store: ResolutionStore,
    directory: Arc<dyn MemberDirectory>,
    delegation: DelegationResolver,
    clock: Arc<dyn Clock>,
    max_duration_minutes: u32,
}

impl VotingService {
    pub fn new(
        storage: Arc<dyn Storage>,
        directory: Arc<dyn MemberDirectory>,
        clock: Arc<dyn Clock>,
        config: &VotingConfig,
    ) -> Self {
        Self {
            store: ResolutionStore::new(
                storage,
                config.max_update_retries,
                Duration::from_millis(config.retry_backoff_ms),
            ),
            delegation: DelegationResolver::new(directory.clone()),
            directory,
            clock,
            max_duration_minutes: config.max_duration_minutes,
        }
    }

    /// Resolutions of `scope` split into active and past, newest first
    pub async fn list_resolutions(&self, caller: &CallerContext, scope: &str) -> GovernanceResult<ResolutionListing> {
        observe("list_resolutions", self.list_inner(caller, scope).await)
    }

    /// Create a resolution; administrators of `scope` only
    pub async fn create_resolution(
        &self,
        caller: &CallerContext,
        scope: &str,
        draft: ResolutionDraft,
    ) -> GovernanceResult<ResolutionId> {
        observe("create_resolution", self.create_inner(caller, scope, draft).await)
    }

    /// Replace title, details, duration and proposer of an open resolution
    pub async fn edit_resolution(
        &self,
        caller: &CallerContext,
        id: &str,
        scope: &str,
        draft: ResolutionDraft,
    ) -> GovernanceResult<Resolution> {
        observe("edit_resolution", self.edit_inner(caller, id, scope, draft).await)
    }

    /// Delete a resolution, open or closed
    pub async fn delete_resolution(&self, caller: &CallerContext, id: &str, scope: &str) -> GovernanceResult<()> {
        observe("delete_resolution", self.delete_inner(caller, id, scope).await)
    }

    /// Record the caller's ballot and return the updated tally
    pub async fn cast_vote(&self, caller: &CallerContext, id: &str, request: VoteRequest) -> GovernanceResult<Tally> {
        observe("cast_vote", self.vote_inner(caller, id, request).await)
    }

    /// One row per eligible member of the resolution's cooperative
    pub async fn ballot_detail(&self, caller: &CallerContext, id: &str) -> GovernanceResult<Vec<DetailEntry>> {
        observe("ballot_detail", self.detail_inner(caller, id).await)
    }

    pub async fn get_resolution(&self, caller: &CallerContext, id: &str) -> GovernanceResult<Resolution> {
        let result = match ResolutionId::parse(id) {
            Ok(id) => self.store.get_in_scope(&id, &caller.scope_id).await,
            Err(e) => Err(e),
        };
        observe("get_resolution", result)
    }

    pub async fn tally(&self, caller: &CallerContext, id: &str) -> GovernanceResult<Tally> {
        self.get_resolution(caller, id)
            .await
            .map(|resolution| Tally::of(&resolution.ballots))
    }

    pub fn status(&self, resolution: &Resolution) -> lifecycle::Status {
        lifecycle::status(resolution, self.clock.now())
    }

    /// Time left to vote, zero once closed
    pub fn remaining(&self, resolution: &Resolution) -> chrono::Duration {
        lifecycle::remaining(resolution, self.clock.now())
    }

    async fn list_inner(&self, caller: &CallerContext, scope: &str) -> GovernanceResult<ResolutionListing> {
        let scope = ScopeId::parse(scope)?;
        if !caller.belongs_to(&scope) {
            return Err(GovernanceError::permission_denied(format!(
                "member {} does not belong to cooperative {}",
                caller.member_id, scope
            )));
        }

        let resolutions = self.store.list_by_scope(&scope).await?;
        Ok(ResolutionListing::partition(resolutions, self.clock.now()))
    }

    async fn create_inner(
        &self,
        caller: &CallerContext,
        scope: &str,
        draft: ResolutionDraft,
    ) -> GovernanceResult<ResolutionId> {
        let scope = self.authorize_management(caller, scope)?;
        let draft = self.validate_draft(draft)?;

        let resolution = self
            .store
            .create(
                scope,
                draft.title,
                draft.details,
                draft.duration_minutes,
                draft.proposer,
                self.clock.now(),
            )
            .await?;
        Ok(resolution.id)
    }

    async fn edit_inner(
        &self,
        caller: &CallerContext,
        id: &str,
        scope: &str,
        draft: ResolutionDraft,
    ) -> GovernanceResult<Resolution> {
        let scope = self.authorize_management(caller, scope)?;
        let id = ResolutionId::parse(id)?;
        let draft = self.validate_draft(draft)?;
        let now = self.clock.now();

        let (resolution, ()) = self
            .store
            .update_with(&id, &scope, |resolution| {
                lifecycle::ensure_open(resolution, now)?;
                resolution.title = draft.title.clone();
                resolution.details = draft.details.clone();
                resolution.duration_minutes = draft.duration_minutes;
                if let Some(proposer) = &draft.proposer {
                    resolution.proposer = Some(proposer.clone());
                }
                Ok(())
            })
            .await?;

        info!(id = %id, scope = %scope, editor = %caller.member_id, "edited resolution");
        Ok(resolution)
    }

    async fn delete_inner(&self, caller: &CallerContext, id: &str, scope: &str) -> GovernanceResult<()> {
        let scope = self.authorize_management(caller, scope)?;
        let id = ResolutionId::parse(id)?;

        if self.store.delete(&id, &scope).await? {
            Ok(())
        } else {
            Err(GovernanceError::not_found(id.to_string()))
        }
    }

    async fn vote_inner(&self, caller: &CallerContext, id: &str, request: VoteRequest) -> GovernanceResult<Tally> {
        let id = ResolutionId::parse(id)?;
        let option = VoteOption::parse(&request.option)?;

        let resolution = self.store.get_in_scope(&id, &caller.scope_id).await?;
        lifecycle::ensure_open(&resolution, self.clock.now())?;

        let delegate_to = self
            .delegation
            .resolve(&resolution.scope_id, &caller.member_id, request.delegate_to.as_deref())
            .await?;
        let command = VoteCommand {
            voter: caller.member_id.clone(),
            option,
            delegate_to,
        };

        let clock = self.clock.clone();
        let (resolution, effect) = self
            .store
            .update_with(&id, &resolution.scope_id, move |resolution| {
                let now = clock.now();
                lifecycle::ensure_open(resolution, now)?;
                Ok(apply_vote(&mut resolution.ballots, &command, now))
            })
            .await?;

        info!(
            id = %id,
            voter = %caller.member_id,
            option = %option,
            direct = ?effect.direct,
            proxy = ?effect.proxy,
            "recorded vote"
        );
        Ok(Tally::of(&resolution.ballots))
    }

    async fn detail_inner(&self, caller: &CallerContext, id: &str) -> GovernanceResult<Vec<DetailEntry>> {
        let id = ResolutionId::parse(id)?;
        let resolution = self.store.get_in_scope(&id, &caller.scope_id).await?;

        let eligible = self.directory.eligible_members(&resolution.scope_id).await?;
        let roster = self.directory.scope_members(&resolution.scope_id).await?;
        Ok(tally::detail(&resolution, &eligible, &roster))
    }

    /// Parse `scope` and apply the capability predicate
    fn authorize_management(&self, caller: &CallerContext, scope: &str) -> GovernanceResult<ScopeId> {
        let scope = ScopeId::parse(scope)?;
        if !can_manage_resolutions(&scope, caller) {
            return Err(GovernanceError::permission_denied(format!(
                "member {} cannot manage resolutions of cooperative {}",
                caller.member_id, scope
            )));
        }
        Ok(scope)
    }

    fn validate_draft(&self, draft: ResolutionDraft) -> GovernanceResult<ValidDraft> {
        let title = match draft.title.as_deref() {
            Some(title) => validate_non_empty(title, "title")?.to_string(),
            None => return Err(GovernanceError::validation("title is required")),
        };
        let duration = draft
            .duration_minutes
            .ok_or_else(|| GovernanceError::validation("durationMinutes is required"))?;
        validate_range(duration, 1, i64::from(self.max_duration_minutes), "durationMinutes")?;
        let duration_minutes =
            u32::try_from(duration).map_err(|_| GovernanceError::validation("durationMinutes is out of range"))?;

        let proposer = match draft.proposer.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(proposer) => Some(MemberId::parse(proposer)?),
        };

        Ok(ValidDraft {
            title,
            details: draft.details.map(|d| d.trim().to_string()).unwrap_or_default(),
            proposer,
            duration_minutes,
        })
    }
}

fn observe<T>(operation: &'static str, result: GovernanceResult<T>) -> GovernanceResult<T> {
    if let Err(e) = &result {
        match e.kind() {
            ErrorKind::Internal => error!(operation, "{}", e),
            _ => warn!(operation, "{}", e),
        }
    }
    result
}
