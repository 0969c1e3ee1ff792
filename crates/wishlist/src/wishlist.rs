use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use velora_catalog::ProductId;
use velora_core::{Aggregate, AggregateId, AggregateRoot, CustomerId, DomainError, ShopId};
use velora_events::Event;

/// Wishlist identifier. One wishlist exists per customer; it shares the
/// customer's id so toggles from concurrent requests contend on a single
/// stream and the store's version check acts as the uniqueness constraint.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WishlistId(pub AggregateId);

impl WishlistId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn for_customer(customer_id: CustomerId) -> Self {
        Self(customer_id.into())
    }
}

impl core::fmt::Display for WishlistId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// What a toggle did to the membership set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleOutcome {
    Added,
    Removed,
}

/// Aggregate root: Wishlist (set of products a customer saved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wishlist {
    id: WishlistId,
    shop_id: Option<ShopId>,
    customer_id: Option<CustomerId>,
    entries: HashSet<ProductId>,
    version: u64,
}

impl Wishlist {
    /// Create an empty aggregate instance for rehydration.
    ///
    /// Wishlists have no explicit creation step: the first toggle brings the
    /// stream into existence.
    pub fn empty(id: WishlistId) -> Self {
        Self {
            id,
            shop_id: None,
            customer_id: None,
            entries: HashSet::new(),
            version: 0,
        }
    }

    pub fn id_typed(&self) -> WishlistId {
        self.id
    }

    pub fn contains(&self, product_id: ProductId) -> bool {
        self.entries.contains(&product_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AggregateRoot for Wishlist {
    type Id = WishlistId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ToggleEntry — add when absent, remove when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleEntry {
    pub shop_id: ShopId,
    pub wishlist_id: WishlistId,
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WishlistCommand {
    ToggleEntry(ToggleEntry),
}

/// Event: EntryAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryAdded {
    pub shop_id: ShopId,
    pub wishlist_id: WishlistId,
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EntryRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRemoved {
    pub shop_id: ShopId,
    pub wishlist_id: WishlistId,
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WishlistEvent {
    EntryAdded(EntryAdded),
    EntryRemoved(EntryRemoved),
}

impl WishlistEvent {
    pub fn outcome(&self) -> ToggleOutcome {
        match self {
            WishlistEvent::EntryAdded(_) => ToggleOutcome::Added,
            WishlistEvent::EntryRemoved(_) => ToggleOutcome::Removed,
        }
    }
}

impl Event for WishlistEvent {
    fn event_type(&self) -> &'static str {
        match self {
            WishlistEvent::EntryAdded(_) => "wishlist.entry.added",
            WishlistEvent::EntryRemoved(_) => "wishlist.entry.removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            WishlistEvent::EntryAdded(e) => e.occurred_at,
            WishlistEvent::EntryRemoved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Wishlist {
    type Command = WishlistCommand;
    type Event = WishlistEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            WishlistEvent::EntryAdded(e) => {
                self.id = e.wishlist_id;
                self.shop_id = Some(e.shop_id);
                self.customer_id = Some(e.customer_id);
                self.entries.insert(e.product_id);
            }
            WishlistEvent::EntryRemoved(e) => {
                self.entries.remove(&e.product_id);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            WishlistCommand::ToggleEntry(cmd) => self.handle_toggle(cmd),
        }
    }
}

impl Wishlist {
    fn ensure_shop(&self, shop_id: ShopId) -> Result<(), DomainError> {
        match self.shop_id {
            None => Ok(()),
            Some(existing) if existing == shop_id => Ok(()),
            Some(_) => Err(DomainError::invariant("shop mismatch")),
        }
    }

    fn ensure_owner(&self, customer_id: CustomerId) -> Result<(), DomainError> {
        match self.customer_id {
            None => Ok(()),
            Some(existing) if existing == customer_id => Ok(()),
            Some(_) => Err(DomainError::Unauthorized),
        }
    }

    fn handle_toggle(&self, cmd: &ToggleEntry) -> Result<Vec<WishlistEvent>, DomainError> {
        self.ensure_shop(cmd.shop_id)?;
        self.ensure_owner(cmd.customer_id)?;

        if self.id != cmd.wishlist_id {
            return Err(DomainError::invariant("wishlist_id mismatch"));
        }

        let event = if self.entries.contains(&cmd.product_id) {
            WishlistEvent::EntryRemoved(EntryRemoved {
                shop_id: cmd.shop_id,
                wishlist_id: cmd.wishlist_id,
                customer_id: cmd.customer_id,
                product_id: cmd.product_id,
                occurred_at: cmd.occurred_at,
            })
        } else {
            WishlistEvent::EntryAdded(EntryAdded {
                shop_id: cmd.shop_id,
                wishlist_id: cmd.wishlist_id,
                customer_id: cmd.customer_id,
                product_id: cmd.product_id,
                occurred_at: cmd.occurred_at,
            })
        };

        Ok(vec![event])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use velora_core::AggregateId;

    fn test_shop_id() -> ShopId {
        ShopId::new()
    }

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn toggle_cmd(
        shop_id: ShopId,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> WishlistCommand {
        WishlistCommand::ToggleEntry(ToggleEntry {
            shop_id,
            wishlist_id: WishlistId::for_customer(customer_id),
            customer_id,
            product_id,
            occurred_at: test_time(),
        })
    }

    #[test]
    fn first_toggle_adds_the_entry() {
        let shop_id = test_shop_id();
        let customer_id = CustomerId::new();
        let product_id = test_product_id();
        let mut wishlist = Wishlist::empty(WishlistId::for_customer(customer_id));

        let events = wishlist
            .handle(&toggle_cmd(shop_id, customer_id, product_id))
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome(), ToggleOutcome::Added);

        wishlist.apply(&events[0]);
        assert!(wishlist.contains(product_id));
        assert_eq!(wishlist.len(), 1);
    }

    #[test]
    fn second_toggle_removes_the_entry() {
        let shop_id = test_shop_id();
        let customer_id = CustomerId::new();
        let product_id = test_product_id();
        let mut wishlist = Wishlist::empty(WishlistId::for_customer(customer_id));

        let events = wishlist
            .handle(&toggle_cmd(shop_id, customer_id, product_id))
            .unwrap();
        wishlist.apply(&events[0]);

        let events = wishlist
            .handle(&toggle_cmd(shop_id, customer_id, product_id))
            .unwrap();
        assert_eq!(events[0].outcome(), ToggleOutcome::Removed);
        wishlist.apply(&events[0]);

        assert!(!wishlist.contains(product_id));
        assert!(wishlist.is_empty());
    }

    #[test]
    fn toggling_one_product_leaves_others_alone() {
        let shop_id = test_shop_id();
        let customer_id = CustomerId::new();
        let keep = test_product_id();
        let churn = test_product_id();
        let mut wishlist = Wishlist::empty(WishlistId::for_customer(customer_id));

        for product_id in [keep, churn, churn] {
            let events = wishlist
                .handle(&toggle_cmd(shop_id, customer_id, product_id))
                .unwrap();
            wishlist.apply(&events[0]);
        }

        assert!(wishlist.contains(keep));
        assert!(!wishlist.contains(churn));
    }

    #[test]
    fn foreign_customer_cannot_toggle() {
        let shop_id = test_shop_id();
        let owner = CustomerId::new();
        let product_id = test_product_id();
        let mut wishlist = Wishlist::empty(WishlistId::for_customer(owner));

        let events = wishlist
            .handle(&toggle_cmd(shop_id, owner, product_id))
            .unwrap();
        wishlist.apply(&events[0]);

        let intruder = CustomerId::new();
        let err = wishlist
            .handle(&WishlistCommand::ToggleEntry(ToggleEntry {
                shop_id,
                wishlist_id: wishlist.id_typed(),
                customer_id: intruder,
                product_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::Unauthorized => {}
            _ => panic!("Expected Unauthorized for foreign toggle"),
        }
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: toggling the same product twice is an involution on
            /// membership, whatever state the wishlist starts in.
            #[test]
            fn double_toggle_restores_membership(prefix_len in 0usize..8) {
                let shop_id = test_shop_id();
                let customer_id = CustomerId::new();
                let mut wishlist = Wishlist::empty(WishlistId::for_customer(customer_id));

                // Arbitrary prior state: a few other products toggled in.
                for _ in 0..prefix_len {
                    let events = wishlist
                        .handle(&toggle_cmd(shop_id, customer_id, test_product_id()))
                        .unwrap();
                    wishlist.apply(&events[0]);
                }

                let product_id = test_product_id();
                let before = wishlist.contains(product_id);
                let size_before = wishlist.len();

                for _ in 0..2 {
                    let events = wishlist
                        .handle(&toggle_cmd(shop_id, customer_id, product_id))
                        .unwrap();
                    wishlist.apply(&events[0]);
                }

                prop_assert_eq!(wishlist.contains(product_id), before);
                prop_assert_eq!(wishlist.len(), size_before);
            }
        }
    }
}
