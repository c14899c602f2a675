//! Catalog browsing commands.

use shopfront_client::ClientConfig;
use shopfront_client::models::{Product, ProductQuery};
use shopfront_core::ProductId;

use super::{CommandError, connect};

/// List products.
///
/// # Errors
///
/// Returns an error if the request fails.
pub async fn products(config: &ClientConfig, query: &ProductQuery) -> Result<(), CommandError> {
    let storefront = connect(config).await?;
    let products = storefront.catalog().list_products(query).await?;
    print_products(&products);
    Ok(())
}

/// Show one product.
///
/// # Errors
///
/// Returns an error if the product does not exist or the request fails.
pub async fn product(config: &ClientConfig, id: ProductId) -> Result<(), CommandError> {
    let storefront = connect(config).await?;
    let product = storefront.catalog().get_product(id).await?;
    print_product(&product);
    Ok(())
}

/// List product categories.
///
/// # Errors
///
/// Returns an error if the request fails.
pub async fn categories(config: &ClientConfig) -> Result<(), CommandError> {
    let storefront = connect(config).await?;
    print_categories(&storefront.catalog().categories().await?);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_products(products: &[Product]) {
    if products.is_empty() {
        println!("No products found");
        return;
    }
    for product in products {
        let stock = if product.in_stock() { "" } else { " (out of stock)" };
        println!(
            "{:>5}  {:<40} {:>10}{stock}",
            product.id, product.name, product.price
        );
    }
}

#[allow(clippy::print_stdout)]
fn print_product(product: &Product) {
    println!("{} (#{})", product.name, product.id);
    println!("  price:    {}", product.price);
    if let Some(category) = &product.category {
        println!("  category: {category}");
    }
    println!("  stock:    {}", product.stock);
    println!(
        "  rating:   {:.1} ({} reviews)",
        product.rating, product.review_count
    );
    if let Some(description) = &product.description {
        println!();
        println!("{description}");
    }
}

#[allow(clippy::print_stdout)]
fn print_categories(categories: &[String]) {
    for category in categories {
        println!("{category}");
    }
}
