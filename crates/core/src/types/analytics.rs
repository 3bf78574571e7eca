//! Analytics payloads returned by the StoreSight backend.
//!
//! Every field the backend may omit carries `#[serde(default)]` so a partial
//! response degrades to zeros instead of failing the whole card.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::metric::Metric;
use super::price::Money;

/// Shopify IDs arrive as numbers from REST endpoints and as strings from
/// GraphQL-backed ones; accept both.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

/// One day of revenue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenuePoint {
    pub date: NaiveDate,
    #[serde(default)]
    pub revenue: Money,
}

/// Revenue card data: the headline total plus the daily series.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RevenueData {
    #[serde(default)]
    pub total_revenue: Money,
    #[serde(default)]
    pub timeseries: Vec<RevenuePoint>,
}

/// A best-selling product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSales {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub quantity: u64,
    #[serde(default)]
    pub revenue: Money,
}

/// A product variant running low on stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub quantity: i64,
}

/// A recently added product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// New products card data.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewProductsData {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub products: Vec<NewProduct>,
}

/// Conversion insights card data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConversionData {
    /// Percentage of sessions that converted, e.g. `2.5` for 2.5%.
    #[serde(default)]
    pub conversion_rate: f64,
}

/// An order, as listed on the recent orders card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub total_price: Money,
    #[serde(default)]
    pub financial_status: Option<String>,
}

/// Abandoned carts card data.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AbandonedCartsData {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub value: Money,
}

/// The payload of one metric, as stored in a cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "metric", content = "data", rename_all = "camelCase")]
pub enum MetricPayload {
    Revenue(RevenueData),
    Products(Vec<ProductSales>),
    Inventory(Vec<InventoryItem>),
    NewProducts(NewProductsData),
    Insights(ConversionData),
    Orders(Vec<Order>),
    AbandonedCarts(AbandonedCartsData),
}

impl MetricPayload {
    /// The zero/empty value shown when a metric is unavailable to the plan.
    #[must_use]
    pub fn empty(metric: Metric) -> Self {
        match metric {
            Metric::Revenue => Self::Revenue(RevenueData::default()),
            Metric::Products => Self::Products(Vec::new()),
            Metric::Inventory => Self::Inventory(Vec::new()),
            Metric::NewProducts => Self::NewProducts(NewProductsData::default()),
            Metric::Insights => Self::Insights(ConversionData::default()),
            Metric::Orders => Self::Orders(Vec::new()),
            Metric::AbandonedCarts => Self::AbandonedCarts(AbandonedCartsData::default()),
        }
    }

    /// The metric this payload belongs to.
    #[must_use]
    pub const fn metric(&self) -> Metric {
        match self {
            Self::Revenue(_) => Metric::Revenue,
            Self::Products(_) => Metric::Products,
            Self::Inventory(_) => Metric::Inventory,
            Self::NewProducts(_) => Metric::NewProducts,
            Self::Insights(_) => Metric::Insights,
            Self::Orders(_) => Metric::Orders,
            Self::AbandonedCarts(_) => Metric::AbandonedCarts,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_accepts_numeric_id() {
        let order: Order = serde_json::from_str(
            r##"{"id": 4501, "name": "#1001", "created_at": "2024-03-01T10:00:00Z", "total_price": "19.99"}"##,
        )
        .unwrap();
        assert_eq!(order.id, "4501");
        assert_eq!(order.total_price, Money::from_cents(1999));
        assert_eq!(order.financial_status, None);
    }

    #[test]
    fn test_empty_payload_matches_metric() {
        for metric in Metric::ALL {
            assert_eq!(MetricPayload::empty(metric).metric(), metric);
        }
    }

    #[test]
    fn test_payload_tagging() {
        let payload = MetricPayload::AbandonedCarts(AbandonedCartsData {
            count: 2,
            value: Money::from_cents(5000),
        });
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["metric"], "abandonedCarts");
        assert_eq!(json["data"]["count"], 2);

        let back: MetricPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }
}
