//! The flattened view model behind the insights page.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use storesight_core::{
    InventoryItem, Metric, MetricPayload, MetricState, Money, NewProduct, Order, ProductSales,
    RevenuePoint,
};

/// Every card's data in one flat structure; missing metrics read as zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Insights {
    pub total_revenue: Money,
    pub revenue_timeseries: Vec<RevenuePoint>,
    pub top_products: Vec<ProductSales>,
    pub low_inventory: Vec<InventoryItem>,
    pub new_products: u64,
    pub recent_products: Vec<NewProduct>,
    pub conversion_rate: f64,
    pub abandoned_carts: u64,
    pub abandoned_cart_value: Money,
    pub orders: Vec<Order>,
    pub rate_limited: bool,
    /// Most recent fetch time across all cards.
    pub last_updated: Option<DateTime<Utc>>,
}

impl Insights {
    /// Project per-metric states onto the view model.
    #[must_use]
    pub fn from_states(
        states: &BTreeMap<Metric, MetricState<MetricPayload>>,
        rate_limited: bool,
    ) -> Self {
        let mut insights = Self {
            rate_limited,
            ..Self::default()
        };

        for state in states.values() {
            let MetricState::Fresh { data, fetched_at } = state else {
                continue;
            };
            insights.last_updated = insights.last_updated.max(Some(*fetched_at));

            match data {
                MetricPayload::Revenue(revenue) => {
                    insights.total_revenue = revenue.total_revenue;
                    insights.revenue_timeseries.clone_from(&revenue.timeseries);
                }
                MetricPayload::Products(products) => insights.top_products.clone_from(products),
                MetricPayload::Inventory(items) => insights.low_inventory.clone_from(items),
                MetricPayload::NewProducts(new_products) => {
                    insights.new_products = new_products.count;
                    insights.recent_products.clone_from(&new_products.products);
                }
                MetricPayload::Insights(conversion) => {
                    insights.conversion_rate = conversion.conversion_rate;
                }
                MetricPayload::Orders(orders) => insights.orders.clone_from(orders),
                MetricPayload::AbandonedCarts(carts) => {
                    insights.abandoned_carts = carts.count;
                    insights.abandoned_cart_value = carts.value;
                }
            }
        }

        insights
    }
}
