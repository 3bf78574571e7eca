use serde::Deserialize;
use storesight_core::{ErrorKind, Order};
use tracing::{debug, warn};

use super::FetchContext;
use crate::api::{ApiError, ORDERS_PATH, Transport};

#[derive(Debug, Deserialize)]
struct OrdersPage {
    #[serde(default)]
    orders: Vec<Order>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    rate_limited: bool,
}

async fn fetch_page<T: Transport>(ctx: &FetchContext<T>, page: u32) -> Result<OrdersPage, ApiError> {
    let query = [
        ("page", page.to_string()),
        ("limit", ctx.orders.page_size.to_string()),
        ("days", ctx.orders.days.to_string()),
    ];
    ctx.get(ORDERS_PATH, &query).await
}

/// Page through recent orders, newest first.
///
/// A failure on the first page fails the metric. A failure on a later page
/// keeps what was collected, except for an expired session.
pub(super) async fn load<T: Transport>(ctx: &FetchContext<T>) -> Result<Vec<Order>, ApiError> {
    let first = fetch_page(ctx, 1).await?;
    let mut orders = first.orders;
    let mut has_more = first.has_more && !first.rate_limited;
    let mut page = 1;

    while has_more && page <= ctx.orders.max_extra_pages {
        page += 1;
        tokio::time::sleep(ctx.orders.page_delay).await;

        match fetch_page(ctx, page).await {
            Ok(next) => {
                orders.extend(next.orders);
                has_more = next.has_more && !next.rate_limited;
            }
            Err(error) if error.kind == ErrorKind::AuthRequired => return Err(error),
            Err(error) => {
                if error.kind == ErrorKind::RateLimited {
                    ctx.rate_limited.raise();
                }
                warn!(page, error = %error, "stopping orders pagination early");
                break;
            }
        }
    }

    debug!(pages = page, orders = orders.len(), "orders loaded");
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(orders)
}
