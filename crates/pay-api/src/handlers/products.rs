//! Read-only catalog: `/api/products`

use super::ApiResult;
use crate::extract::{present, query_params};
use crate::state::AppState;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use pay_core::{
    CommerceError, Pagination, Product, ProductCategory, ProductQuery, ProductRepository,
    ProductSort, SortOrder,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

/// Largest page a client may request
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ListProductsParams {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub category: Option<ProductCategory>,
    #[serde(default)]
    pub featured: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: Option<ProductSort>,
    #[serde(default)]
    pub order: Option<SortOrder>,
}

impl ListProductsParams {
    fn into_query(self) -> Result<ProductQuery, CommerceError> {
        let defaults = ProductQuery::default();
        let query = ProductQuery {
            page: self.page.unwrap_or(defaults.page),
            limit: self.limit.unwrap_or(defaults.limit),
            category: self.category,
            featured_only: self.featured.as_deref() == Some("true"),
            search: present(self.search),
            sort: self.sort.unwrap_or_default(),
            order: self.order.unwrap_or_default(),
        };

        if query.page == 0 || query.limit == 0 || query.limit > MAX_PAGE_SIZE {
            return Err(CommerceError::InvalidRequest(
                "Invalid query parameters".to_string(),
            ));
        }
        Ok(query)
    }
}

#[derive(Debug, Serialize)]
pub struct ProductList {
    pub data: Vec<Product>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    pub data: Product,
}

/// Active products, filtered, sorted and paginated
#[instrument(skip_all)]
pub async fn list_products(
    State(state): State<AppState>,
    query: Result<Query<ListProductsParams>, QueryRejection>,
) -> ApiResult<Json<ProductList>> {
    let query = query_params(query)?.into_query()?;
    let page = state.store.list_products(&query).await?;

    Ok(Json(ProductList {
        pagination: Pagination::new(query.page, query.limit, page.total),
        data: page.items,
    }))
}

/// One active product
#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> ApiResult<Json<ProductDetail>> {
    let not_found = || CommerceError::ProductNotFound {
        product_id: product_id.clone(),
    };

    let id = Uuid::parse_str(&product_id).map_err(|_| not_found())?;
    let product = state.store.get_product(id).await?.ok_or_else(not_found)?;

    Ok(Json(ProductDetail { data: product }))
}
