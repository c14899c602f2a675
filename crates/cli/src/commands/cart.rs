//! Cart commands.
//!
//! The CLI addresses cart lines by product ID; the matching line item ID is
//! looked up in the freshly fetched cart.

use shopfront_client::{CartState, ClientConfig, Storefront};
use shopfront_core::{CartItemId, ProductId};
use tracing::info;

use super::{CommandError, connect_authenticated};

/// Print the cart.
///
/// # Errors
///
/// Returns an error if there is no valid session.
pub async fn show(config: &ClientConfig) -> Result<(), CommandError> {
    let storefront = connect_authenticated(config).await?;
    print_cart(&storefront.cart().snapshot());
    Ok(())
}

/// Add `quantity` units of a product.
///
/// # Errors
///
/// Returns an error if there is no valid session or the backend rejects
/// the request (unknown product, insufficient stock).
pub async fn add(
    config: &ClientConfig,
    product_id: ProductId,
    quantity: u32,
) -> Result<(), CommandError> {
    let storefront = connect_authenticated(config).await?;
    storefront.cart().add_to_cart(product_id, quantity).await?;
    info!(%product_id, quantity, "Added to cart");
    print_cart(&storefront.cart().snapshot());
    Ok(())
}

/// Set the quantity of a product already in the cart.
///
/// # Errors
///
/// Returns an error if the product is not in the cart or the update fails.
pub async fn update(
    config: &ClientConfig,
    product_id: ProductId,
    quantity: u32,
) -> Result<(), CommandError> {
    let storefront = connect_authenticated(config).await?;
    let item_id = line_item(&storefront, product_id)?;
    storefront.cart().update_quantity(item_id, quantity).await?;
    print_cart(&storefront.cart().snapshot());
    Ok(())
}

/// Remove a product from the cart.
///
/// # Errors
///
/// Returns an error if the product is not in the cart or the removal fails.
pub async fn remove(config: &ClientConfig, product_id: ProductId) -> Result<(), CommandError> {
    let storefront = connect_authenticated(config).await?;
    let item_id = line_item(&storefront, product_id)?;
    storefront.cart().remove_from_cart(item_id).await?;
    print_cart(&storefront.cart().snapshot());
    Ok(())
}

/// Empty the cart.
///
/// # Errors
///
/// Returns an error if there is no valid session or the request fails.
pub async fn clear(config: &ClientConfig) -> Result<(), CommandError> {
    let storefront = connect_authenticated(config).await?;
    storefront.cart().clear_cart().await?;
    info!("Cart cleared");
    Ok(())
}

fn line_item(storefront: &Storefront, product_id: ProductId) -> Result<CartItemId, CommandError> {
    storefront
        .cart()
        .snapshot()
        .line_for(product_id)
        .map(|item| item.id)
        .ok_or_else(|| CommandError::NotInCart(product_id.to_string()))
}

#[allow(clippy::print_stdout)]
fn print_cart(cart: &CartState) {
    if cart.is_empty() {
        println!("Cart is empty");
        return;
    }
    for item in &cart.items {
        println!(
            "{:>5}  {:<40} {:>3} x {:>10} = {:>10}",
            item.product_id,
            item.product.name,
            item.quantity,
            item.product.price,
            item.line_total()
        );
    }
    println!(
        "{} item(s), total {}",
        cart.total_items(),
        cart.total_price()
    );
}
