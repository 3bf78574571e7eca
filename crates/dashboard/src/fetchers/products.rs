use serde::Deserialize;
use storesight_core::ProductSales;

use super::FetchContext;
use crate::api::{ApiError, PRODUCTS_PATH, Transport};

#[derive(Debug, Deserialize)]
struct ProductsResponse {
    #[serde(default)]
    products: Vec<ProductSales>,
}

/// Best sellers, highest revenue first.
pub(super) async fn load<T: Transport>(ctx: &FetchContext<T>) -> Result<Vec<ProductSales>, ApiError> {
    let mut products = ctx.get::<ProductsResponse>(PRODUCTS_PATH, &[]).await?.products;
    products.sort_by(|a, b| b.revenue.cmp(&a.revenue));
    Ok(products)
}
