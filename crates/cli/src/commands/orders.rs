//! Checkout and order history commands.

use shopfront_client::ClientConfig;
use shopfront_client::models::Order;
use shopfront_core::OrderId;

use super::{CommandError, connect_authenticated};

/// Place an order for the current cart.
///
/// # Errors
///
/// Returns an error if there is no valid session, the cart is empty, or the
/// request fails.
pub async fn checkout(config: &ClientConfig, shipping_address: &str) -> Result<(), CommandError> {
    let storefront = connect_authenticated(config).await?;
    let order = storefront.checkout(shipping_address).await?;
    print_order(&order);
    Ok(())
}

/// List orders, or show one in detail.
///
/// # Errors
///
/// Returns an error if there is no valid session or the request fails.
pub async fn orders(config: &ClientConfig, id: Option<OrderId>) -> Result<(), CommandError> {
    let storefront = connect_authenticated(config).await?;
    match id {
        Some(id) => print_order(&storefront.orders().get_order(id).await?),
        None => print_orders(&storefront.orders().list_orders().await?),
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_orders(orders: &[Order]) {
    if orders.is_empty() {
        println!("No orders yet");
        return;
    }
    for order in orders {
        println!(
            "#{:<5} {:<12} {:>10}  {}",
            order.id,
            order.status,
            order.total_amount,
            order.created_at.as_deref().unwrap_or("-")
        );
    }
}

#[allow(clippy::print_stdout)]
fn print_order(order: &Order) {
    println!("Order #{} ({})", order.id, order.status);
    println!("  ship to: {}", order.shipping_address);
    for item in &order.order_items {
        println!(
            "  {:>3} x {:<40} {:>10}",
            item.quantity, item.product.name, item.price
        );
    }
    println!("  total:   {}", order.total_amount);
}
