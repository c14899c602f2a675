//! Cart line items.

use serde::{Deserialize, Serialize};

use shopfront_core::{CartItemId, Price, ProductId, UserId};

use super::Product;

/// One line of the cart as returned by `/cart/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// Line item ID (used for update and remove).
    pub id: CartItemId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Owning user.
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// The referenced product, including its current price.
    pub product: Product,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl CartItem {
    /// `product.price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.price * self.quantity
    }
}

/// Body of `POST /cart/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NewCartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}
