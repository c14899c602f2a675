//! Product catalog client.
//!
//! Products change rarely compared to carts, so listings, single products
//! and the category list are cached with `moka` (5-minute TTL). Search
//! results are never cached.

mod cache;

use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, instrument};

use shopfront_core::ProductId;

use crate::api::ApiClient;
use crate::error::Result;
use crate::models::{Product, ProductQuery};

use cache::{CacheKey, CacheValue};

const PRODUCTS_PATH: &str = "/products/";
const CATEGORIES_PATH: &str = "/products/categories/list";

/// Read-only access to the product catalog.
///
/// Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct Catalog {
    api: ApiClient,
    cache: Cache<CacheKey, CacheValue>,
}

impl Catalog {
    /// Create a catalog client with the default cache settings.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self::with_ttl(api, Duration::from_secs(300))
    }

    /// Create a catalog client whose entries expire after `ttl`.
    #[must_use]
    pub fn with_ttl(api: ApiClient, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(1000).time_to_live(ttl).build();
        Self { api, cache }
    }

    /// List products matching `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>> {
        let query = query.normalized();
        let key = CacheKey::Products(query.clone());

        if query.is_cacheable()
            && let Some(CacheValue::Products(products)) = self.cache.get(&key).await
        {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let products: Vec<Product> = self.api.get_with_query(PRODUCTS_PATH, &query).await?;

        if query.is_cacheable() {
            self.cache
                .insert(key, CacheValue::Products(products.clone()))
                .await;
        }

        Ok(products)
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the product does not exist (HTTP 404) or the API
    /// request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product> {
        let key = CacheKey::Product(id);

        if let Some(CacheValue::Product(product)) = self.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product: Product = self.api.get(&format!("/products/{id}")).await?;
        self.cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// Distinct product categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Vec<String>> {
        if let Some(CacheValue::Categories(categories)) =
            self.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories: Vec<String> = self.api.get(CATEGORIES_PATH).await?;
        self.cache
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(categories.clone()),
            )
            .await;

        Ok(categories)
    }

    /// Drop every cached entry.
    pub fn invalidate(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::ClientConfig;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn product(id: i64) -> serde_json::Value {
        json!({
            "id": id,
            "name": format!("Tea {id}"),
            "description": "Loose leaf",
            "price": 12.5,
            "image_url": null,
            "category": "tea",
            "stock": 4,
            "rating": 4.0,
            "review_count": 10,
            "created_at": "2025-01-01T00:00:00"
        })
    }

    fn catalog_for(server: &MockServer) -> Catalog {
        let config = ClientConfig::for_api_url(&format!("{}/api", server.uri())).unwrap();
        Catalog::new(ApiClient::new(&config, Arc::new(MemoryStorage::new())).unwrap())
    }

    #[tokio::test]
    async fn test_get_product_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/products/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(product(3)))
            .expect(1)
            .mount(&server)
            .await;

        let catalog = catalog_for(&server);
        let first = catalog.get_product(ProductId::new(3)).await.unwrap();
        let second = catalog.get_product(ProductId::new(3)).await.unwrap();

        assert_eq!(first, second);
        assert!(first.in_stock());
    }

    #[tokio::test]
    async fn test_missing_product_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/products/99"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"detail": "Product not found"})),
            )
            .mount(&server)
            .await;

        let err = catalog_for(&server)
            .get_product(ProductId::new(99))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_products_sends_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/products/"))
            .and(query_param("category", "tea"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([product(1), product(2)])))
            .expect(1)
            .mount(&server)
            .await;

        let catalog = catalog_for(&server);
        let query = ProductQuery {
            category: Some("tea".to_string()),
            limit: Some(250),
            ..ProductQuery::default()
        };

        assert_eq!(catalog.list_products(&query).await.unwrap().len(), 2);
        // Served from cache the second time.
        assert_eq!(catalog.list_products(&query).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_search_results_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/products/"))
            .and(query_param("search", "green"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([product(1)])))
            .expect(2)
            .mount(&server)
            .await;

        let catalog = catalog_for(&server);
        let query = ProductQuery {
            search: Some("green".to_string()),
            ..ProductQuery::default()
        };
        catalog.list_products(&query).await.unwrap();
        catalog.list_products(&query).await.unwrap();
    }

    #[tokio::test]
    async fn test_categories_and_invalidate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/products/categories/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["coffee", "tea"])))
            .expect(2)
            .mount(&server)
            .await;

        let catalog = catalog_for(&server);
        assert_eq!(catalog.categories().await.unwrap(), vec!["coffee", "tea"]);
        catalog.categories().await.unwrap();

        catalog.invalidate();
        catalog.categories().await.unwrap();
    }
}
