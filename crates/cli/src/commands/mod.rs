//! Subcommand implementations.
//!
//! Every command opens a [`Storefront`] over the file-backed token storage,
//! so a login in one invocation is visible to the next.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod orders;

use std::sync::Arc;

use shopfront_client::{ClientConfig, ClientError, FileStorage, Storefront};
use shopfront_core::EmailError;
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command needs a session and none is stored.
    #[error("Not logged in. Run `shop login <username>` first")]
    NotLoggedIn,

    /// The stored token was rejected by the backend.
    #[error("Session expired. Run `shop login <username>` again")]
    SessionExpired,

    /// Invalid email on registration.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// No cart line for the given product.
    #[error("Product {0} is not in the cart")]
    NotInCart(String),

    /// Request or storage failure.
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Open the storefront and wait for any stored session to be verified.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built or the token file
/// cannot be read.
pub async fn connect(config: &ClientConfig) -> Result<Storefront, CommandError> {
    let (storefront, _) = open(config).await?;
    Ok(storefront)
}

/// Like [`connect`], but fails unless the stored session is still valid.
///
/// The cart is loaded before returning.
///
/// # Errors
///
/// Returns [`CommandError::NotLoggedIn`] without a token and
/// [`CommandError::SessionExpired`] if the backend rejected it.
pub async fn connect_authenticated(config: &ClientConfig) -> Result<Storefront, CommandError> {
    let (storefront, had_token) = open(config).await?;
    if !had_token {
        return Err(CommandError::NotLoggedIn);
    }
    if !storefront.auth().is_authenticated() {
        return Err(CommandError::SessionExpired);
    }

    storefront.cart().fetch_cart().await;
    Ok(storefront)
}

/// Returns the storefront and whether a token was stored before the restore.
async fn open(config: &ClientConfig) -> Result<(Storefront, bool), CommandError> {
    let storage = Arc::new(FileStorage::new(config.token_file.clone()));
    let (storefront, restore) = Storefront::new(config.clone(), storage)?;
    let had_token = storefront.auth().is_authenticated();
    restore.wait().await;
    Ok((storefront, had_token))
}
