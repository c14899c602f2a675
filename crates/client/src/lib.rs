//! Shopfront client library.
//!
//! A typed REST client for the Shopfront backend plus the two reactive
//! stores a storefront UI is built on: [`AuthStore`] (who is logged in) and
//! [`CartStore`] (what is in the cart). [`Storefront`] wires them to one
//! shared [`ApiClient`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod orders;
pub mod state;
pub mod storage;
pub mod stores;

pub use api::ApiClient;
pub use catalog::Catalog;
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, Result};
pub use orders::Orders;
pub use state::Storefront;
pub use storage::{FileStorage, MemoryStorage, StorageError, TokenStorage};
pub use stores::{AuthStore, CartState, CartStore, ClearCartPolicy, Session, SessionRestore};
