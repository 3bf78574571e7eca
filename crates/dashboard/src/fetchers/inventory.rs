use serde::Deserialize;
use storesight_core::InventoryItem;

use super::FetchContext;
use crate::api::{ApiError, LOW_INVENTORY_PATH, Transport};

#[derive(Debug, Deserialize)]
struct LowInventoryResponse {
    #[serde(default, alias = "products")]
    low_inventory: Vec<InventoryItem>,
}

pub(super) async fn load<T: Transport>(ctx: &FetchContext<T>) -> Result<Vec<InventoryItem>, ApiError> {
    let mut items = ctx
        .get::<LowInventoryResponse>(LOW_INVENTORY_PATH, &[])
        .await?
        .low_inventory;
    items.sort_by_key(|item| item.quantity);
    Ok(items)
}
