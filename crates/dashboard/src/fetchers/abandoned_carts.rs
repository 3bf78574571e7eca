use serde::Deserialize;
use storesight_core::{AbandonedCartsData, Money};

use super::FetchContext;
use crate::api::{ABANDONED_CARTS_PATH, ApiError, Transport};

#[derive(Debug, Deserialize)]
struct AbandonedCartsResponse {
    #[serde(default, alias = "count")]
    abandoned_carts: u64,
    #[serde(default, alias = "value")]
    abandoned_value: Money,
}

pub(super) async fn load<T: Transport>(ctx: &FetchContext<T>) -> Result<AbandonedCartsData, ApiError> {
    let response = ctx
        .get::<AbandonedCartsResponse>(ABANDONED_CARTS_PATH, &[])
        .await?;
    Ok(AbandonedCartsData {
        count: response.abandoned_carts,
        value: response.abandoned_value,
    })
}
