//! API-side authorization guard for commands.
//!
//! Enforces authorization at the command boundary (before dispatch), while
//! keeping domain aggregates and infra auth-agnostic.

use velora_auth::{
    authorize, AuthzError, CommandAuthorization, Permission, Principal, ShopMembership,
};

use crate::context::{PrincipalContext, ShopContext};

/// Check authorization for a command in the current request context.
///
/// This is intended to be called **before** dispatching a command.
pub fn authorize_command<C: CommandAuthorization>(
    shop: &ShopContext,
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    authorize_permissions(shop, principal, command.required_permissions())
}

/// Check a set of permissions directly (used by privileged queries).
pub fn authorize_permissions(
    shop: &ShopContext,
    principal: &PrincipalContext,
    required: &[Permission],
) -> Result<(), AuthzError> {
    let membership = ShopMembership {
        shop_id: shop.shop_id(),
        roles: principal.roles().to_vec(),
        permissions: permissions_from_roles(principal.roles()),
    };

    let principal = Principal {
        principal_id: principal.principal_id(),
        active_shop_id: shop.shop_id(),
        membership,
    };

    for perm in required {
        authorize(&principal, perm)?;
    }

    Ok(())
}

/// Minimal role→permission mapping stub.
///
/// This is intentionally simple until a real policy source exists (e.g. DB-backed).
fn permissions_from_roles(roles: &[velora_auth::Role]) -> Vec<Permission> {
    // Convention: "admin" grants all permissions in the current shop.
    if roles.iter().any(|r| r.as_str() == "admin") {
        return vec![Permission::new("*")];
    }

    Vec::new()
}
