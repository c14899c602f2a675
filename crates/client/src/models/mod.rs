//! Wire types exchanged with the storefront backend.
//!
//! These mirror the backend's response schemas. Timestamps are kept as the
//! strings the server sends; the client never does date arithmetic.

mod cart;
mod order;
mod product;
mod user;

pub use cart::{CartItem, NewCartItem};
pub use order::{NewOrder, Order, OrderItem};
pub use product::{Product, ProductQuery};
pub use user::{NewUser, TokenResponse, User};
