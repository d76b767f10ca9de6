//! # Product Types
//!
//! Catalog rows from the `products` table plus the listing query.
//! The memory backend seeds its catalog from `config/products.toml`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;
use uuid::Uuid;

/// Product line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductCategory {
    Liquid,
    Spray,
}

impl ProductCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Liquid => "liquid",
            ProductCategory::Spray => "spray",
        }
    }
}

impl FromStr for ProductCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "liquid" => Ok(ProductCategory::Liquid),
            "spray" => Ok(ProductCategory::Spray),
            other => Err(format!("unknown category: {}", other)),
        }
    }
}

/// A product in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Unit price in USD
    pub price: f64,

    pub category: ProductCategory,

    #[serde(default)]
    pub colors: Vec<String>,

    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default)]
    pub featured: bool,

    /// Inactive products are hidden from the storefront
    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default)]
    pub stock_quantity: i32,

    #[serde(default)]
    pub rating: f64,

    #[serde(default)]
    pub review_count: i32,

    /// Suggested uses ("cakes", "cocktails", ...)
    #[serde(default)]
    pub for_use: Vec<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Product {
    /// Create an active product
    pub fn new(name: impl Into<String>, category: ProductCategory, price: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            price,
            category,
            colors: Vec::new(),
            images: Vec::new(),
            featured: false,
            active: true,
            stock_quantity: 0,
            rating: 0.0,
            review_count: 0,
            for_use: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: set description
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Builder: mark as featured
    pub fn featured(mut self) -> Self {
        self.featured = true;
        self
    }

    /// Builder: set rating
    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = rating;
        self
    }

    /// Builder: set creation time
    pub fn created(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self.updated_at = at;
        self
    }
}

/// Column a listing is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    Name,
    Price,
    Rating,
    #[default]
    CreatedAt,
}

impl ProductSort {
    pub fn column(&self) -> &'static str {
        match self {
            ProductSort::Name => "name",
            ProductSort::Price => "price",
            ProductSort::Rating => "rating",
            ProductSort::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Storefront listing query (active products only)
#[derive(Debug, Clone, PartialEq)]
pub struct ProductQuery {
    pub page: u32,
    pub limit: u32,
    pub category: Option<ProductCategory>,
    pub featured_only: bool,
    pub search: Option<String>,
    pub sort: ProductSort,
    pub order: SortOrder,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            category: None,
            featured_only: false,
            search: None,
            sort: ProductSort::CreatedAt,
            order: SortOrder::Desc,
        }
    }
}

impl ProductQuery {
    /// Row offset of the first item on this page
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// Whether `product` belongs in this listing
    pub fn matches(&self, product: &Product) -> bool {
        if !product.active {
            return false;
        }
        if let Some(category) = self.category {
            if product.category != category {
                return false;
            }
        }
        if self.featured_only && !product.featured {
            return false;
        }
        if let Some(term) = self.search.as_deref() {
            let term = term.to_lowercase();
            let in_name = product.name.to_lowercase().contains(&term);
            let in_description = product
                .description
                .as_deref()
                .map(|d| d.to_lowercase().contains(&term))
                .unwrap_or(false);
            if !in_name && !in_description {
                return false;
            }
        }
        true
    }

    /// Ordering for in-process sorting
    pub fn compare(&self, a: &Product, b: &Product) -> Ordering {
        let ordering = match self.sort {
            ProductSort::Name => a.name.cmp(&b.name),
            ProductSort::Price => a.price.total_cmp(&b.price),
            ProductSort::Rating => a.rating.total_cmp(&b.rating),
            ProductSort::CreatedAt => a.created_at.cmp(&b.created_at),
        };
        match self.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Product catalog file (`config/products.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductCatalog {
    #[serde(default)]
    pub products: Vec<Product>,
}

impl ProductCatalog {
    /// Load catalog from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_filters() {
        let gold = Product::new("Liquid Gold", ProductCategory::Liquid, 24.0)
            .with_description("Edible shimmer for cocktails")
            .featured();
        let spray = Product::new("Spray Silver", ProductCategory::Spray, 18.0);
        let mut retired = Product::new("Old Rose", ProductCategory::Liquid, 10.0);
        retired.active = false;

        let by_category = ProductQuery {
            category: Some(ProductCategory::Liquid),
            ..Default::default()
        };
        assert!(by_category.matches(&gold));
        assert!(!by_category.matches(&spray));
        assert!(!by_category.matches(&retired));

        let featured = ProductQuery {
            featured_only: true,
            ..Default::default()
        };
        assert!(featured.matches(&gold));
        assert!(!featured.matches(&spray));

        let search = ProductQuery {
            search: Some("COCKTAIL".into()),
            ..Default::default()
        };
        assert!(search.matches(&gold));
        assert!(!search.matches(&spray));
    }

    #[test]
    fn test_query_ordering() {
        let cheap = Product::new("A", ProductCategory::Spray, 5.0);
        let pricey = Product::new("B", ProductCategory::Spray, 50.0);

        let query = ProductQuery {
            sort: ProductSort::Price,
            order: SortOrder::Asc,
            ..Default::default()
        };
        assert_eq!(query.compare(&cheap, &pricey), Ordering::Less);

        let query = ProductQuery {
            sort: ProductSort::Price,
            ..Default::default()
        };
        assert_eq!(query.compare(&cheap, &pricey), Ordering::Greater);
    }

    #[test]
    fn test_offset() {
        let query = ProductQuery {
            page: 3,
            limit: 20,
            ..Default::default()
        };
        assert_eq!(query.offset(), 40);
    }

    #[test]
    fn test_catalog_from_toml() {
        let catalog = ProductCatalog::from_toml(
            r#"
            [[products]]
            name = "Liquid Gold"
            category = "liquid"
            price = 24.0
            featured = true
            colors = ["gold"]
            "#,
        )
        .unwrap();

        assert_eq!(catalog.products.len(), 1);
        assert!(catalog.products[0].active);
        assert_eq!(catalog.products[0].category, ProductCategory::Liquid);
    }
}
