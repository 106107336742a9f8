//! Proxy target validation
//!
//! Runs before any mutation, so a rejected delegation leaves the resolution
//! untouched.

use std::sync::Arc;

use tracing::debug;

use coopvote_common::{MemberId, ScopeId};
use coopvote_identity::MemberDirectory;

use crate::{GovernanceError, GovernanceResult};

/// Checks proxy targets against the member directory
pub struct DelegationResolver {
    directory: Arc<dyn MemberDirectory>,
}

impl DelegationResolver {
    pub fn new(directory: Arc<dyn MemberDirectory>) -> Self {
        Self { directory }
    }

    /// Validate `delegate_to` for a vote cast by `caller` on a resolution of
    /// `scope`. Returns the parsed delegate, or `None` when no proxy was named.
    pub async fn resolve(
        &self,
        scope: &ScopeId,
        caller: &MemberId,
        delegate_to: Option<&str>,
    ) -> GovernanceResult<Option<MemberId>> {
        let raw = match delegate_to.map(str::trim) {
            None | Some("") => return Ok(None),
            Some(raw) => raw,
        };
        let delegate = MemberId::parse(raw)?;

        if &delegate == caller {
            return Err(GovernanceError::conflict("a member cannot delegate to themselves"));
        }

        match self.directory.find_member(scope, &delegate).await? {
            Some(member) if !member.is_admin() => {
                debug!(scope = %scope, delegate = %delegate, "delegate accepted");
                Ok(Some(delegate))
            }
            Some(_) => Err(GovernanceError::conflict(format!(
                "member {} is an administrator and cannot act as a proxy",
                delegate
            ))),
            None => Err(GovernanceError::conflict(format!(
                "member {} does not belong to cooperative {}",
                delegate, scope
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coopvote_identity::{Member, MemberRegistry, Role};
    use coopvote_storage::MemoryStorage;

    async fn resolver() -> DelegationResolver {
        let registry = MemberRegistry::new(Arc::new(MemoryStorage::new()));
        for (id, scope, name, role) in [
            ("b", "coop1", "Beatriz Gómez", Role::Member),
            ("c", "coop1", "Carlos Ruiz", Role::Member),
            ("admin", "coop1", "Ada Admin", Role::CooperativeAdmin),
            ("x", "coop2", "Xavier Otro", Role::Member),
        ] {
            let member = Member::from_display_name(
                MemberId::parse(id).unwrap(),
                ScopeId::parse(scope).unwrap(),
                name,
                role,
            );
            registry.register(&member).await.unwrap();
        }
        DelegationResolver::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn test_resolve() {
        let resolver = resolver().await;
        let scope = ScopeId::parse("coop1").unwrap();
        let b = MemberId::parse("b").unwrap();

        assert_eq!(resolver.resolve(&scope, &b, None).await.unwrap(), None);
        assert_eq!(resolver.resolve(&scope, &b, Some("  ")).await.unwrap(), None);
        assert_eq!(
            resolver.resolve(&scope, &b, Some("c")).await.unwrap(),
            Some(MemberId::parse("c").unwrap())
        );
    }

    #[tokio::test]
    async fn test_rejections() {
        let resolver = resolver().await;
        let scope = ScopeId::parse("coop1").unwrap();
        let b = MemberId::parse("b").unwrap();

        let self_delegation = resolver.resolve(&scope, &b, Some("b")).await;
        assert!(matches!(self_delegation, Err(GovernanceError::Conflict(_))));

        let admin = resolver.resolve(&scope, &b, Some("admin")).await;
        assert!(matches!(admin, Err(GovernanceError::Conflict(_))));

        let other_scope = resolver.resolve(&scope, &b, Some("x")).await;
        assert!(matches!(other_scope, Err(GovernanceError::Conflict(_))));

        let malformed = resolver.resolve(&scope, &b, Some("not/an/id")).await;
        assert!(matches!(malformed, Err(GovernanceError::Validation(_))));
    }
}
