//! Storefront root context shared across the application.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, instrument};

use crate::api::ApiClient;
use crate::catalog::Catalog;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::models::Order;
use crate::orders::Orders;
use crate::storage::TokenStorage;
use crate::stores::{AuthStore, CartStore, SessionRestore};

/// Application root: one API client, one session, one cart.
///
/// This struct is cheaply cloneable via `Arc`. Every component shares the
/// same [`ApiClient`], so a token set through [`AuthStore`] is attached to
/// cart, catalog and order requests.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: ClientConfig,
    api: ApiClient,
    auth: AuthStore,
    cart: CartStore,
    catalog: Catalog,
    orders: Orders,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
}

impl Storefront {
    /// Build the storefront and start restoring any persisted session.
    ///
    /// Must be called from within a Tokio runtime: the returned
    /// [`SessionRestore`] wraps a spawned `/auth/me` request when a token was
    /// found in `storage`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the storage
    /// cannot be read.
    pub fn new(
        config: ClientConfig,
        storage: Arc<dyn TokenStorage>,
    ) -> Result<(Self, SessionRestore)> {
        let api = ApiClient::new(&config, storage)?;
        let auth = AuthStore::new(api.clone())?;
        let cart = CartStore::new(api.clone(), config.clear_cart_policy);
        let catalog = Catalog::new(api.clone());
        let orders = Orders::new(api.clone());

        let restore = auth.restore_session();

        let storefront = Self {
            inner: Arc::new(StorefrontInner {
                config,
                api,
                auth,
                cart,
                catalog,
                orders,
            }),
        };
        Ok((storefront, restore))
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn auth(&self) -> &AuthStore {
        &self.inner.auth
    }

    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    #[must_use]
    pub fn orders(&self) -> &Orders {
        &self.inner.orders
    }

    /// Place an order for the current cart, then re-sync the cart.
    ///
    /// The backend empties the cart when the order is created, so after
    /// success the local cart reflects the server (normally empty).
    ///
    /// # Errors
    ///
    /// Returns an error if placing the order fails; the cart is left as is.
    #[instrument(skip(self, shipping_address))]
    pub async fn checkout(&self, shipping_address: &str) -> Result<Order> {
        let order = self.inner.orders.place_order(shipping_address).await?;
        self.inner.cart.fetch_cart().await;
        Ok(order)
    }

    /// Backend health status (`"healthy"` when up).
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or answers with an
    /// error status.
    #[instrument(skip(self))]
    pub async fn health(&self) -> Result<String> {
        let health: HealthResponse = self.inner.api.get("/health").await?;
        info!(status = %health.status, "Backend health");
        Ok(health.status)
    }
}
