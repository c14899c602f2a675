//! Order placement and history.
//!
//! Placing an order turns the current server-side cart into an order and
//! empties the cart on the server. Callers holding a [`CartStore`] should
//! re-fetch afterwards; [`Storefront::checkout`] does both.
//!
//! [`CartStore`]: crate::stores::CartStore
//! [`Storefront::checkout`]: crate::state::Storefront::checkout

use tracing::{info, instrument};

use shopfront_core::OrderId;

use crate::api::ApiClient;
use crate::error::{Result, add_breadcrumb};
use crate::models::{NewOrder, Order};

const ORDERS_PATH: &str = "/orders/";

/// Client for the current user's orders.
#[derive(Debug, Clone)]
pub struct Orders {
    api: ApiClient,
}

impl Orders {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Place an order for everything in the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails. The backend answers 400 when
    /// the cart is empty.
    #[instrument(skip(self, shipping_address))]
    pub async fn place_order(&self, shipping_address: &str) -> Result<Order> {
        let body = NewOrder {
            shipping_address: shipping_address.trim().to_string(),
        };
        let order: Order = self.api.post_json(ORDERS_PATH, &body).await?;

        info!(order_id = %order.id, total = %order.total_amount, "Order placed");
        let order_id = order.id.to_string();
        add_breadcrumb("orders", "Order placed", Some(&[("order_id", order_id.as_str())]));
        Ok(order)
    }

    /// All orders of the current user.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        self.api.get(ORDERS_PATH).await
    }

    /// A single order of the current user.
    ///
    /// # Errors
    ///
    /// Returns an error if the order does not exist for this user (HTTP 404)
    /// or the request fails.
    #[instrument(skip(self))]
    pub async fn get_order(&self, id: OrderId) -> Result<Order> {
        self.api.get(&format!("/orders/{id}")).await
    }
}
