//! Reactive state stores.
//!
//! Each store keeps its state in a [`tokio::sync::watch`] channel. Readers
//! either take a snapshot or subscribe and await changes; derived values
//! (authentication flag, cart totals) are computed from the snapshot on
//! every read, so they can never go stale.
//!
//! - [`AuthStore`] - session identity: user profile and persisted bearer token
//! - [`CartStore`] - mirror of the server-side cart

mod auth;
mod cart;

pub use auth::{AuthStore, Session, SessionRestore};
pub use cart::{CartState, CartStore, ClearCartPolicy};
