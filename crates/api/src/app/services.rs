use std::sync::Arc;

use serde_json::Value as JsonValue;

use velora_catalog::ProductId;
use velora_core::{AggregateId, CustomerId, DomainError, ShopId};
use velora_events::{EventBus, EventEnvelope, InMemoryEventBus};
use velora_infra::{
    command_dispatcher::{CommandDispatcher, DispatchError},
    event_store::{InMemoryEventStore, StoredEvent},
    projections::{
        catalog::{CatalogProjection, ProductReadModel},
        invoices::{InvoiceReadModel, InvoicesProjection},
        reviews::{ReviewBoardProjection, ReviewReadModel},
        sales_orders::{SalesOrderReadModel, SalesOrdersProjection},
        stock::{StockLevelReadModel, StockLevelsProjection},
        wishlist::{WishlistEntryReadModel, WishlistProjection},
    },
    read_model::InMemoryShopStore,
};
use velora_invoicing::InvoiceId;
use velora_reviews::ReviewId;
use velora_sales::SalesOrderId;

type Bus = InMemoryEventBus<EventEnvelope<JsonValue>>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Arc<Bus>>;

pub type CatalogProj = CatalogProjection<Arc<InMemoryShopStore<ProductId, ProductReadModel>>>;
pub type StockProj = StockLevelsProjection<Arc<InMemoryShopStore<ProductId, StockLevelReadModel>>>;
pub type ReviewsProj = ReviewBoardProjection<Arc<InMemoryShopStore<ReviewId, ReviewReadModel>>>;
pub type WishlistProj =
    WishlistProjection<Arc<InMemoryShopStore<(CustomerId, ProductId), WishlistEntryReadModel>>>;
pub type OrdersProj = SalesOrdersProjection<Arc<InMemoryShopStore<SalesOrderId, SalesOrderReadModel>>>;
pub type InvoicesProj = InvoicesProjection<Arc<InMemoryShopStore<InvoiceId, InvoiceReadModel>>>;

/// Application services: command dispatch plus the query-side projections.
///
/// Storage is in-memory; the `EventStore`/`EventBus` traits are the seam for
/// a persistent backend.
#[derive(Clone)]
pub struct AppServices {
    dispatcher: Arc<Dispatcher>,
    catalog: Arc<CatalogProj>,
    stock: Arc<StockProj>,
    reviews: Arc<ReviewsProj>,
    wishlist: Arc<WishlistProj>,
    orders: Arc<OrdersProj>,
    invoices: Arc<InvoicesProj>,
}

/// Wire the event store, bus, projections, and the projection subscriber.
pub fn build_services() -> AppServices {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Arc<Bus> = Arc::new(InMemoryEventBus::new());

    let catalog: Arc<CatalogProj> =
        Arc::new(CatalogProjection::new(Arc::new(InMemoryShopStore::new())));
    let stock: Arc<StockProj> =
        Arc::new(StockLevelsProjection::new(Arc::new(InMemoryShopStore::new())));
    let reviews: Arc<ReviewsProj> =
        Arc::new(ReviewBoardProjection::new(Arc::new(InMemoryShopStore::new())));
    let wishlist: Arc<WishlistProj> =
        Arc::new(WishlistProjection::new(Arc::new(InMemoryShopStore::new())));
    let orders: Arc<OrdersProj> =
        Arc::new(SalesOrdersProjection::new(Arc::new(InMemoryShopStore::new())));
    let invoices: Arc<InvoicesProj> =
        Arc::new(InvoicesProjection::new(Arc::new(InMemoryShopStore::new())));

    // Background subscriber: bus -> projections.
    {
        let sub = bus.subscribe();
        let catalog = catalog.clone();
        let stock = stock.clone();
        let reviews = reviews.clone();
        let wishlist = wishlist.clone();
        let orders = orders.clone();
        let invoices = invoices.clone();
        tokio::task::spawn_blocking(move || loop {
            match sub.recv() {
                Ok(env) => {
                    let apply_ok = match env.aggregate_type() {
                        "catalog.product" => catalog.apply_envelope(&env).map_err(|e| e.to_string()),
                        "inventory.ledger" => stock.apply_envelope(&env).map_err(|e| e.to_string()),
                        "reviews.review" => reviews.apply_envelope(&env).map_err(|e| e.to_string()),
                        "wishlist.wishlist" => {
                            wishlist.apply_envelope(&env).map_err(|e| e.to_string())
                        }
                        "sales.order" => orders.apply_envelope(&env).map_err(|e| e.to_string()),
                        "invoicing.invoice" => {
                            invoices.apply_envelope(&env).map_err(|e| e.to_string())
                        }
                        _ => Ok(()),
                    };

                    if let Err(e) = apply_ok {
                        tracing::warn!("projection apply failed: {e}");
                    }
                }
                Err(_) => break,
            }
        });
    }

    let dispatcher: Arc<Dispatcher> = Arc::new(CommandDispatcher::new(store, bus));

    AppServices {
        dispatcher,
        catalog,
        stock,
        reviews,
        wishlist,
        orders,
        invoices,
    }
}

impl AppServices {
    pub fn dispatch<A>(
        &self,
        shop_id: ShopId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(ShopId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: velora_core::Aggregate<Error = DomainError>,
        A::Event: velora_events::Event + serde::Serialize + serde::de::DeserializeOwned,
    {
        self.dispatcher
            .dispatch::<A>(shop_id, aggregate_id, aggregate_type, command, make_aggregate)
    }

    pub fn catalog(&self) -> &CatalogProj {
        &self.catalog
    }

    pub fn stock(&self) -> &StockProj {
        &self.stock
    }

    pub fn reviews(&self) -> &ReviewsProj {
        &self.reviews
    }

    pub fn wishlist(&self) -> &WishlistProj {
        &self.wishlist
    }

    pub fn orders(&self) -> &OrdersProj {
        &self.orders
    }

    pub fn invoices(&self) -> &InvoicesProj {
        &self.invoices
    }
}
