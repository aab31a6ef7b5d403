//! Public catalog.
//!
//! Every product leaves priced at the request instant: `effectivePrice`,
//! `onSale` and the flash-sale countdown come from the pricing resolver, so an
//! expired sale shows base price without anything having been written.

use axum::extract::{Path, Query, State};
use serde::Deserialize;

use crate::error::ApiError;
use crate::response::{ApiResponse, ApiResult};
use crate::state::AppState;
use flashmart_core::validation::validate_search_query;
use flashmart_core::{Category, PricedProduct};
use flashmart_db::ProductFilter;

/// Maximum products per listing.
const LIST_LIMIT: u32 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub search: Option<String>,
}

impl ProductQuery {
    fn into_filter(self) -> Result<ProductFilter, ApiError> {
        let category = self
            .category
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .map(str::parse::<Category>)
            .transpose()?;

        let search = self
            .search
            .as_deref()
            .map(validate_search_query)
            .transpose()?;

        Ok(ProductFilter { category, search })
    }
}

/// `GET /api/products`
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<Vec<PricedProduct>> {
    let filter = query.into_filter()?;
    let now = state.clock.now();

    let products = state.db.products().list(&filter, LIST_LIMIT).await?;

    Ok(ApiResponse::list(
        products
            .into_iter()
            .map(|p| PricedProduct::at(p, now))
            .collect(),
    ))
}

/// `GET /api/products/flash-sales`
pub async fn list_flash_sales(State(state): State<AppState>) -> ApiResult<Vec<PricedProduct>> {
    let now = state.clock.now();
    let products = state.db.products().list_flash_sales(now).await?;

    Ok(ApiResponse::list(
        products
            .into_iter()
            .map(|p| PricedProduct::at(p, now))
            .collect(),
    ))
}

/// `GET /api/products/{id}`
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<PricedProduct> {
    let product = state
        .db
        .products()
        .find_active(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".into()))?;

    Ok(ApiResponse::ok(PricedProduct::at(product, state.clock.now())))
}
