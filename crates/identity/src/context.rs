//! Caller context and roles

use serde::{Deserialize, Serialize};

use coopvote_common::{MemberId, ScopeId};

/// Role a member holds inside their cooperative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Regular member; may vote and act as a proxy
    #[default]
    Member,
    /// Administrator of one cooperative
    CooperativeAdmin,
    /// Platform-wide operator, still bound to the scope it acts in
    Superuser,
}

impl Role {
    /// Administrators manage resolutions and are never eligible as proxies
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::CooperativeAdmin | Role::Superuser)
    }
}

/// Who is calling, as established by the identity provider.
///
/// Built once at the request boundary and passed explicitly to every
/// voting operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    pub member_id: MemberId,
    pub display_name: String,
    pub scope_id: ScopeId,
    pub role: Role,
}

impl CallerContext {
    pub fn new(member_id: MemberId, display_name: impl Into<String>, scope_id: ScopeId, role: Role) -> Self {
        Self {
            member_id,
            display_name: display_name.into(),
            scope_id,
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn belongs_to(&self, scope: &ScopeId) -> bool {
        &self.scope_id == scope
    }
}

/// The one place that decides whether a caller may create, edit or delete
/// resolutions of `scope`.
pub fn can_manage_resolutions(scope: &ScopeId, caller: &CallerContext) -> bool {
    caller.is_admin() && caller.belongs_to(scope)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: Role, scope: &str) -> CallerContext {
        CallerContext::new(
            MemberId::parse("m1").unwrap(),
            "Juan Pérez",
            ScopeId::parse(scope).unwrap(),
            role,
        )
    }

    #[test]
    fn test_capability_predicate() {
        let scope = ScopeId::parse("coop1").unwrap();

        assert!(can_manage_resolutions(&scope, &caller(Role::CooperativeAdmin, "coop1")));
        assert!(can_manage_resolutions(&scope, &caller(Role::Superuser, "coop1")));
        assert!(!can_manage_resolutions(&scope, &caller(Role::Member, "coop1")));
        assert!(!can_manage_resolutions(&scope, &caller(Role::CooperativeAdmin, "coop2")));
    }

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::CooperativeAdmin).unwrap(), "\"cooperative-admin\"");
        let role: Role = serde_json::from_str("\"member\"").unwrap();
        assert_eq!(role, Role::Member);
    }
}
