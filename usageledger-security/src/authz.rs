//! Workspace and account authorization checks, matching the membership
//! rules the upstream gateway already enforced when it issued the token:
//! this service only re-checks the claims it was handed.

use crate::claims::TokenClaims;
use crate::error::{AuthzError, AuthzResult};

/// Require that `claims` belongs to (or, if `allow_hub_admin`, administers)
/// `workspace`. If `require_owner` is set, membership in `workspaces` is not
/// enough: the caller must be listed in `workspaces_owned`.
pub fn workspace_authz(
    workspace: &str,
    claims: &TokenClaims,
    require_owner: bool,
    allow_hub_admin: bool,
) -> AuthzResult<()> {
    if allow_hub_admin && claims.is_hub_admin() {
        return Ok(());
    }

    if require_owner {
        if !claims.workspaces_owned.iter().any(|w| w == workspace) {
            return Err(AuthzError::NotWorkspaceOwner);
        }
    } else if !claims.workspaces.iter().any(|w| w == workspace) {
        return Err(AuthzError::WorkspaceNotAllowed);
    }

    Ok(())
}

/// Require that `claims` holds `account_id` as a billing account, or is a
/// hub admin when `allow_hub_admin` is set.
pub fn account_authz(account_id: &str, claims: &TokenClaims, allow_hub_admin: bool) -> AuthzResult<()> {
    if allow_hub_admin && claims.is_hub_admin() {
        return Ok(());
    }

    if !claims.billing_accounts.iter().any(|a| a == account_id) {
        return Err(AuthzError::NotAccountOwner);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::RealmAccess;

    fn claims(workspaces: &[&str], owned: &[&str], accounts: &[&str], roles: &[&str]) -> TokenClaims {
        TokenClaims {
            workspaces: workspaces.iter().map(|s| s.to_string()).collect(),
            workspaces_owned: owned.iter().map(|s| s.to_string()).collect(),
            billing_accounts: accounts.iter().map(|s| s.to_string()).collect(),
            realm_access: RealmAccess { roles: roles.iter().map(|s| s.to_string()).collect() },
        }
    }

    #[test]
    fn member_may_read_their_workspace() {
        let c = claims(&["my-workspace"], &[], &[], &[]);
        assert!(workspace_authz("my-workspace", &c, false, true).is_ok());
    }

    #[test]
    fn non_member_is_rejected() {
        let c = claims(&["other-workspace"], &[], &[], &[]);
        assert_eq!(
            workspace_authz("my-workspace", &c, false, true),
            Err(AuthzError::WorkspaceNotAllowed)
        );
    }

    #[test]
    fn hub_admin_bypasses_membership() {
        let c = claims(&[], &[], &[], &["hub_admin"]);
        assert!(workspace_authz("my-workspace", &c, false, true).is_ok());
    }

    #[test]
    fn hub_admin_not_honoured_when_disallowed() {
        let c = claims(&[], &[], &[], &["hub_admin"]);
        assert_eq!(
            workspace_authz("my-workspace", &c, false, false),
            Err(AuthzError::WorkspaceNotAllowed)
        );
    }

    #[test]
    fn account_owner_is_allowed() {
        let c = claims(&[], &[], &["4b48ebea-bdb8-4bb9-bce9-a7853ad3965d"], &[]);
        assert!(account_authz("4b48ebea-bdb8-4bb9-bce9-a7853ad3965d", &c, true).is_ok());
    }

    #[test]
    fn non_owner_is_rejected() {
        let c = claims(&[], &[], &["some-other-account"], &[]);
        assert_eq!(
            account_authz("4b48ebea-bdb8-4bb9-bce9-a7853ad3965d", &c, true),
            Err(AuthzError::NotAccountOwner)
        );
    }
}
