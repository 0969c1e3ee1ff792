use velora_auth::{PrincipalId, Role};
use velora_core::{CustomerId, ShopId};

/// Shop context for a request.
///
/// Public storefront routes resolve it from the `X-Shop-Id` header;
/// authenticated routes derive it from the token claims. It must be present
/// for all domain routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ShopContext {
    shop_id: ShopId,
}

impl ShopContext {
    pub fn new(shop_id: ShopId) -> Self {
        Self { shop_id }
    }

    pub fn shop_id(&self) -> ShopId {
        self.shop_id
    }
}

/// Principal context for a request (authenticated identity + roles).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: PrincipalId,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(principal_id: PrincipalId, roles: Vec<Role>) -> Self {
        Self { principal_id, roles }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    /// The customer identity this principal shops as.
    pub fn customer_id(&self) -> CustomerId {
        self.principal_id.as_customer()
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}
