//! Orders placed from the cart.

use serde::{Deserialize, Serialize};

use shopfront_core::{OrderId, OrderItemId, OrderStatus, Price, ProductId, UserId};

use super::Product;

/// A placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    /// Sum of line prices at the time of purchase.
    pub total_amount: Price,
    #[serde(default)]
    pub status: OrderStatus,
    pub shipping_address: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub order_items: Vec<OrderItem>,
}

impl Order {
    /// Total number of units across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.order_items.iter().map(|i| u64::from(i.quantity)).sum()
    }
}

/// One purchased line. `price` is the unit price captured at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Price,
    pub product: Product,
}

/// Body of `POST /orders/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewOrder {
    pub shipping_address: String,
}
