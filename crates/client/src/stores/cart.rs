//! Cart store: a mirror of the server-side cart.
//!
//! Mutations never patch the local item list. Each one sends its request and
//! then re-reads the whole cart, so the list is always the server's last
//! answer (the one exception is [`ClearCartPolicy::Local`]).

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::de::IgnoredAny;
use tokio::sync::watch;
use tracing::{error, instrument};

use shopfront_core::{CartItemId, Price, ProductId};

use crate::api::ApiClient;
use crate::error::{ClientError, Result, add_breadcrumb};
use crate::models::{CartItem, NewCartItem};

const CART_PATH: &str = "/cart/";

fn item_path(item_id: CartItemId) -> String {
    format!("/cart/{item_id}")
}

/// What [`CartStore::clear_cart`] does once the server has emptied the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearCartPolicy {
    /// Empty the local list without asking the server again.
    #[default]
    Local,
    /// Re-fetch the cart like every other mutation.
    Refetch,
}

impl FromStr for ClearCartPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "refetch" => Ok(Self::Refetch),
            other => Err(format!("expected 'local' or 'refetch', got '{other}'")),
        }
    }
}

/// Snapshot of the cart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartState {
    /// Line items in server order.
    pub items: Vec<CartItem>,
    /// True while at least one full-cart fetch is in flight.
    pub loading: bool,
}

impl CartState {
    /// Sum of quantities.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Sum of `price * quantity`.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Line holding `product_id`, if any.
    #[must_use]
    pub fn line_for(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }
}

/// Store owning the cart snapshot.
///
/// Cheap to clone; clones share state. Concurrent mutations are not
/// serialized: each re-fetches and the last response to arrive wins.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    api: ApiClient,
    clear_policy: ClearCartPolicy,
    state: watch::Sender<CartState>,
    in_flight: AtomicUsize,
}

/// Marks a fetch as in flight for as long as it lives, including when the
/// fetch future is dropped early.
struct LoadingGuard<'a> {
    inner: &'a CartStoreInner,
}

impl<'a> LoadingGuard<'a> {
    fn start(inner: &'a CartStoreInner) -> Self {
        inner.in_flight.fetch_add(1, Ordering::SeqCst);
        inner.state.send_if_modified(|s| !std::mem::replace(&mut s.loading, true));
        Self { inner }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner
                .state
                .send_if_modified(|s| std::mem::replace(&mut s.loading, false));
        }
    }
}

impl CartStore {
    /// Create an empty cart store.
    #[must_use]
    pub fn new(api: ApiClient, clear_policy: ClearCartPolicy) -> Self {
        let (state, _) = watch::channel(CartState::default());
        Self {
            inner: Arc::new(CartStoreInner {
                api,
                clear_policy,
                state,
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current cart snapshot.
    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every cart change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.inner.state.borrow().items.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.inner.state.borrow().total_items()
    }

    #[must_use]
    pub fn total_price(&self) -> Price {
        self.inner.state.borrow().total_price()
    }

    #[must_use]
    pub fn clear_policy(&self) -> ClearCartPolicy {
        self.inner.clear_policy
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Replace the item list with the server's cart.
    ///
    /// Failures are logged and swallowed: the previous items stay in place.
    /// `loading` is set for the duration of the request.
    #[instrument(skip(self))]
    pub async fn fetch_cart(&self) {
        let _loading = LoadingGuard::start(&self.inner);

        match self.inner.api.get::<Vec<CartItem>>(CART_PATH).await {
            Ok(items) => self.inner.state.send_modify(|s| s.items = items),
            Err(e) => error!(error = %e, "Error fetching cart"),
        }
    }

    /// Add `quantity` units of a product, then re-fetch.
    ///
    /// The server merges into an existing line for the same product.
    ///
    /// # Errors
    ///
    /// Returns the underlying error if the request fails; the items are
    /// left unchanged.
    #[instrument(skip(self))]
    pub async fn add_to_cart(&self, product_id: ProductId, quantity: u32) -> Result<()> {
        let body = NewCartItem {
            product_id,
            quantity: positive(quantity)?,
        };

        self.inner
            .api
            .post_json::<IgnoredAny, _>(CART_PATH, &body)
            .await
            .inspect_err(|e| error!(error = %e, "Error adding to cart"))?;

        let product = product_id.to_string();
        add_breadcrumb("cart", "Added to cart", Some(&[("product_id", product.as_str())]));
        self.fetch_cart().await;
        Ok(())
    }

    /// Add a single unit of a product.
    ///
    /// # Errors
    ///
    /// See [`CartStore::add_to_cart`].
    pub async fn add_one(&self, product_id: ProductId) -> Result<()> {
        self.add_to_cart(product_id, 1).await
    }

    /// Set a line's quantity, then re-fetch.
    ///
    /// # Errors
    ///
    /// Returns the underlying error if the request fails; the items are
    /// left unchanged.
    #[instrument(skip(self))]
    pub async fn update_quantity(&self, item_id: CartItemId, quantity: u32) -> Result<()> {
        let quantity = positive(quantity)?;

        self.inner
            .api
            .put_query::<IgnoredAny, _>(&item_path(item_id), &[("quantity", quantity)])
            .await
            .inspect_err(|e| error!(error = %e, "Error updating cart"))?;

        self.fetch_cart().await;
        Ok(())
    }

    /// Remove a line, then re-fetch.
    ///
    /// # Errors
    ///
    /// Returns the underlying error if the request fails; the items are
    /// left unchanged.
    #[instrument(skip(self))]
    pub async fn remove_from_cart(&self, item_id: CartItemId) -> Result<()> {
        self.inner
            .api
            .delete(&item_path(item_id))
            .await
            .inspect_err(|e| error!(error = %e, "Error removing from cart"))?;

        self.fetch_cart().await;
        Ok(())
    }

    /// Delete every line.
    ///
    /// With [`ClearCartPolicy::Local`] the item list is emptied directly;
    /// with [`ClearCartPolicy::Refetch`] the cart is re-read.
    ///
    /// # Errors
    ///
    /// Returns the underlying error if the request fails; the items are
    /// left unchanged.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<()> {
        self.inner
            .api
            .delete(CART_PATH)
            .await
            .inspect_err(|e| error!(error = %e, "Error clearing cart"))?;

        add_breadcrumb("cart", "Cleared cart", None);
        match self.inner.clear_policy {
            ClearCartPolicy::Local => self.inner.state.send_modify(|s| s.items.clear()),
            ClearCartPolicy::Refetch => self.fetch_cart().await,
        }
        Ok(())
    }
}

fn positive(quantity: u32) -> Result<u32> {
    if quantity == 0 {
        error!(quantity, "Rejected cart quantity");
        return Err(ClientError::InvalidQuantity(quantity));
    }
    Ok(quantity)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::storage::MemoryStorage;
    use rust_decimal::Decimal;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn line(id: i64, product_id: i64, price: f64, quantity: u32) -> serde_json::Value {
        json!({
            "id": id,
            "product_id": product_id,
            "quantity": quantity,
            "user_id": 1,
            "created_at": "2025-03-01T10:00:00",
            "product": {
                "id": product_id,
                "name": format!("Product {product_id}"),
                "description": null,
                "price": price,
                "image_url": null,
                "category": "tea",
                "stock": 10,
                "rating": 4.5,
                "review_count": 3,
                "created_at": "2025-01-01T00:00:00"
            }
        })
    }

    fn store_for(server: &MockServer, policy: ClearCartPolicy) -> CartStore {
        let config = ClientConfig::for_api_url(&format!("{}/api", server.uri())).unwrap();
        let api = ApiClient::new(&config, Arc::new(MemoryStorage::with_token("t"))).unwrap();
        CartStore::new(api, policy)
    }

    async fn mount_cart(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_totals_are_sums_over_items() {
        let state = CartState {
            items: serde_json::from_value(json!([line(1, 10, 2.5, 2), line(2, 11, 10.0, 3)]))
                .unwrap(),
            loading: false,
        };
        assert_eq!(state.total_items(), 5);
        assert_eq!(state.total_price().amount(), Decimal::new(35, 0));
        assert_eq!(state.line_for(ProductId::new(11)).unwrap().id, CartItemId::new(2));

        assert_eq!(CartState::default().total_items(), 0);
        assert_eq!(CartState::default().total_price(), Price::ZERO);
    }

    #[test]
    fn test_clear_policy_from_str() {
        assert_eq!("Refetch".parse::<ClearCartPolicy>().unwrap(), ClearCartPolicy::Refetch);
        assert_eq!(" local ".parse::<ClearCartPolicy>().unwrap(), ClearCartPolicy::Local);
        assert!("sometimes".parse::<ClearCartPolicy>().is_err());
    }

    #[tokio::test]
    async fn test_fetch_cart_replaces_items() {
        let server = MockServer::start().await;
        mount_cart(&server, json!([line(1, 10, 2.5, 2)])).await;

        let store = store_for(&server, ClearCartPolicy::Local);
        store.fetch_cart().await;

        let snapshot = store.snapshot();
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.total_items(), 2);
        assert!(!snapshot.loading);
    }

    #[tokio::test]
    async fn test_fetch_cart_failure_keeps_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([line(1, 10, 2.5, 2)])))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store = store_for(&server, ClearCartPolicy::Local);
        store.fetch_cart().await;
        store.fetch_cart().await;

        assert_eq!(store.items().len(), 1);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_loading_visible_while_in_flight() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(std::time::Duration::from_millis(200)),
            )
            .mount(&server)
            .await;

        let store = store_for(&server, ClearCartPolicy::Local);
        let mut rx = store.subscribe();
        let fetch = tokio::spawn({
            let store = store.clone();
            async move { store.fetch_cart().await }
        });

        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().loading);

        fetch.await.unwrap();
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_add_to_cart_refetches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/cart/"))
            .and(body_json(json!({"product_id": 42, "quantity": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(line(7, 42, 3.25, 2)))
            .expect(1)
            .mount(&server)
            .await;
        mount_cart(&server, json!([line(7, 42, 3.25, 2)])).await;

        let store = store_for(&server, ClearCartPolicy::Local);
        store.add_to_cart(ProductId::new(42), 2).await.unwrap();

        let items = store.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items.first().unwrap().product_id, ProductId::new(42));
        assert_eq!(store.total_items(), 2);
        assert_eq!(store.total_price().amount(), Decimal::new(650, 2));
    }

    #[tokio::test]
    async fn test_add_one_defaults_quantity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/cart/"))
            .and(body_json(json!({"product_id": 5, "quantity": 1})))
            .respond_with(ResponseTemplate::new(200).set_body_json(line(1, 5, 1.0, 1)))
            .expect(1)
            .mount(&server)
            .await;
        mount_cart(&server, json!([line(1, 5, 1.0, 1)])).await;

        let store = store_for(&server, ClearCartPolicy::Local);
        store.add_one(ProductId::new(5)).await.unwrap();
        assert_eq!(store.total_items(), 1);
    }

    #[tokio::test]
    async fn test_zero_quantity_rejected_locally() {
        let server = MockServer::start().await;
        let store = store_for(&server, ClearCartPolicy::Local);

        let err = store.add_to_cart(ProductId::new(1), 0).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidQuantity(0)));

        let err = store.update_quantity(CartItemId::new(1), 0).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidQuantity(0)));

        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_quantity_sends_query_and_refetches() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/cart/7"))
            .and(query_param("quantity", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(line(7, 42, 1.0, 5)))
            .expect(1)
            .mount(&server)
            .await;
        mount_cart(&server, json!([line(7, 42, 1.0, 5)])).await;

        let store = store_for(&server, ClearCartPolicy::Local);
        store.update_quantity(CartItemId::new(7), 5).await.unwrap();
        assert_eq!(store.total_items(), 5);
    }

    #[tokio::test]
    async fn test_failed_mutations_leave_items_unchanged() {
        let server = MockServer::start().await;
        mount_cart(&server, json!([line(7, 42, 1.0, 2)])).await;
        Mock::given(method("PUT"))
            .and(path("/api/cart/7"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"detail": "Cart item not found"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/cart/7"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store = store_for(&server, ClearCartPolicy::Local);
        store.fetch_cart().await;
        let before = store.items();

        let err = store.update_quantity(CartItemId::new(7), 3).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.items(), before);

        let err = store.remove_from_cart(CartItemId::new(7)).await.unwrap_err();
        assert_eq!(err.status(), Some(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(store.items(), before);

        // Only the initial fetch reached the cart endpoint.
        let cart_reads = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.method.as_str() == "GET")
            .count();
        assert_eq!(cart_reads, 1);
    }

    #[tokio::test]
    async fn test_remove_from_cart_refetches() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/cart/3"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"message": "Item removed from cart"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        mount_cart(&server, json!([])).await;

        let store = store_for(&server, ClearCartPolicy::Local);
        store.remove_from_cart(CartItemId::new(3)).await.unwrap();
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_clear_cart_local_skips_refetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([line(1, 2, 1.0, 1)])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/cart/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Cart cleared"})))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server, ClearCartPolicy::Local);
        store.fetch_cart().await;
        assert_eq!(store.items().len(), 1);

        store.clear_cart().await.unwrap();
        assert!(store.items().is_empty());
    }

    #[tokio::test]
    async fn test_clear_cart_refetch_policy() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/cart/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Cart cleared"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server, ClearCartPolicy::Refetch);
        store.clear_cart().await.unwrap();
        assert!(store.items().is_empty());
    }

    #[tokio::test]
    async fn test_clear_cart_failure_propagates() {
        let server = MockServer::start().await;
        mount_cart(&server, json!([line(1, 2, 1.0, 1)])).await;
        Mock::given(method("DELETE"))
            .and(path("/api/cart/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = store_for(&server, ClearCartPolicy::Local);
        store.fetch_cart().await;

        assert!(store.clear_cart().await.is_err());
        assert_eq!(store.items().len(), 1);
    }
}
