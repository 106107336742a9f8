//! Request-boundary authentication
//!
//! The embedding platform authenticates users and forwards their identity
//! with a shared access token. The gate checks the token and the identity
//! fields, makes sure the caller exists in the member directory, and hands
//! back the `CallerContext` every voting operation takes.

use std::sync::Arc;
use tracing::{debug, warn};

use coopvote_common::{MemberId, ScopeId};

use crate::{CallerContext, IdentityError, IdentityResult, Member, MemberRegistry, Role};

/// Identity fields as forwarded by the embedding platform
#[derive(Debug, Clone, Default)]
pub struct AccessRequest {
    pub token: Option<String>,
    pub member_id: Option<String>,
    pub display_name: Option<String>,
    pub scope_id: Option<String>,
    pub role: Role,
}

/// Token check plus caller registration
pub struct AccessGate {
    access_token: Option<String>,
    registry: Arc<MemberRegistry>,
}

impl AccessGate {
    /// `access_token` of `None` disables the token comparison
    pub fn new(access_token: Option<String>, registry: Arc<MemberRegistry>) -> Self {
        Self {
            access_token,
            registry,
        }
    }

    /// Authenticate a request and build its caller context
    pub async fn authenticate(&self, request: AccessRequest) -> IdentityResult<CallerContext> {
        if let Some(expected) = &self.access_token {
            match request.token.as_deref() {
                Some(token) if token == expected => {}
                _ => {
                    warn!("rejected request with missing or invalid access token");
                    return Err(IdentityError::Unauthorized(
                        "Invalid or missing access token".to_string(),
                    ));
                }
            }
        }

        let (member_id, display_name, scope_id) =
            match (request.member_id, request.display_name, request.scope_id) {
                (Some(m), Some(n), Some(s)) if !n.trim().is_empty() => (m, n, s),
                _ => {
                    return Err(IdentityError::Unauthorized(
                        "member id, name and scope id are required".to_string(),
                    ))
                }
            };

        let member_id = MemberId::parse(member_id)?;
        let scope_id = ScopeId::parse(scope_id)?;
        let display_name = display_name.trim().to_string();

        let member = Member::from_display_name(
            member_id.clone(),
            scope_id.clone(),
            &display_name,
            request.role,
        );
        if self.registry.ensure_member(&member).await? {
            debug!(member = %member_id, "caller added to directory");
        }

        Ok(CallerContext::new(member_id, display_name, scope_id, request.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemberDirectory;
    use coopvote_storage::MemoryStorage;

    fn request(token: Option<&str>) -> AccessRequest {
        AccessRequest {
            token: token.map(str::to_string),
            member_id: Some("507f1f77bcf86cd799439011".to_string()),
            display_name: Some("Juan Pérez".to_string()),
            scope_id: Some("507f1f77bcf86cd799439012".to_string()),
            role: Role::Member,
        }
    }

    fn gate(token: Option<&str>) -> (AccessGate, Arc<MemberRegistry>) {
        let registry = Arc::new(MemberRegistry::new(Arc::new(MemoryStorage::new())));
        (AccessGate::new(token.map(str::to_string), registry.clone()), registry)
    }

    #[tokio::test]
    async fn test_valid_token_builds_context_and_registers() {
        let (gate, registry) = gate(Some("ABC123"));

        let caller = gate.authenticate(request(Some("ABC123"))).await.unwrap();
        assert_eq!(caller.display_name, "Juan Pérez");
        assert!(!caller.is_admin());

        let found = registry
            .find_member(&caller.scope_id, &caller.member_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.first_name, "Juan");
        assert_eq!(found.last_name, "Pérez");
    }

    #[tokio::test]
    async fn test_token_mismatch_is_rejected() {
        let (gate, _) = gate(Some("ABC123"));

        let missing = gate.authenticate(request(None)).await;
        assert!(matches!(missing, Err(IdentityError::Unauthorized(_))));

        let wrong = gate.authenticate(request(Some("nope"))).await;
        assert!(matches!(wrong, Err(IdentityError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_missing_fields_are_rejected() {
        let (gate, _) = gate(None);

        let mut req = request(None);
        req.scope_id = None;
        assert!(matches!(gate.authenticate(req).await, Err(IdentityError::Unauthorized(_))));

        let mut req = request(None);
        req.member_id = Some("not valid!".to_string());
        assert!(matches!(gate.authenticate(req).await, Err(IdentityError::InvalidIdentity(_))));
    }
}
