use serde::Deserialize;
use storesight_core::{NewProduct, NewProductsData};

use super::FetchContext;
use crate::api::{ApiError, NEW_PRODUCTS_PATH, Transport};

#[derive(Debug, Deserialize)]
struct NewProductsResponse {
    #[serde(default, alias = "products")]
    new_products: Vec<NewProduct>,
    #[serde(default)]
    count: Option<u64>,
}

/// The backend only sends `count` when it differs from the list length.
pub(super) async fn load<T: Transport>(ctx: &FetchContext<T>) -> Result<NewProductsData, ApiError> {
    let response = ctx.get::<NewProductsResponse>(NEW_PRODUCTS_PATH, &[]).await?;
    let listed = u64::try_from(response.new_products.len()).unwrap_or(u64::MAX);

    Ok(NewProductsData {
        count: response.count.unwrap_or(listed),
        products: response.new_products,
    })
}
