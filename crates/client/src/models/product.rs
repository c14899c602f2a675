//! Product catalog types.

use serde::{Deserialize, Serialize};

use shopfront_core::{Price, ProductId};

/// A product as listed by `/products/` and embedded in cart lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Price,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Units in stock.
    #[serde(default)]
    pub stock: i64,
    /// Average review score.
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: i64,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Product {
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Filters for listing products.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ProductQuery {
    /// Number of products to skip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,
    /// Page size; the backend accepts 1 to 100.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Exact category match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Case-insensitive substring match on name and description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl ProductQuery {
    /// Largest page the backend will return.
    pub const MAX_LIMIT: u32 = 100;

    /// Copy of the query with `limit` clamped into the accepted range.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            limit: self.limit.map(|l| l.clamp(1, Self::MAX_LIMIT)),
            category: self.category.clone().filter(|c| !c.is_empty()),
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
            ..self.clone()
        }
    }

    /// Whether results may be cached (search results are not).
    #[must_use]
    pub const fn is_cacheable(&self) -> bool {
        self.search.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_clamps_limit() {
        let query = ProductQuery {
            limit: Some(500),
            search: Some("  ".to_string()),
            ..ProductQuery::default()
        };
        let normalized = query.normalized();
        assert_eq!(normalized.limit, Some(100));
        assert_eq!(normalized.search, None);
        assert!(normalized.is_cacheable());

        let zero = ProductQuery {
            limit: Some(0),
            ..ProductQuery::default()
        };
        assert_eq!(zero.normalized().limit, Some(1));
    }
}
