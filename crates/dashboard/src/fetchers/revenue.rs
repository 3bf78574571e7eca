use serde::Deserialize;
use storesight_core::{Money, RevenueData, RevenuePoint};

use super::FetchContext;
use crate::api::{ApiError, REVENUE_PATH, REVENUE_TIMESERIES_PATH, Transport};

#[derive(Debug, Deserialize)]
struct RevenueSummary {
    #[serde(default, alias = "revenue")]
    total_revenue: Money,
}

#[derive(Debug, Deserialize)]
struct RevenueTimeseries {
    #[serde(default)]
    timeseries: Vec<RevenuePoint>,
}

/// Headline total and daily series, requested together.
pub(super) async fn load<T: Transport>(ctx: &FetchContext<T>) -> Result<RevenueData, ApiError> {
    let (summary, series) = futures::try_join!(
        ctx.get::<RevenueSummary>(REVENUE_PATH, &[]),
        ctx.get::<RevenueTimeseries>(REVENUE_TIMESERIES_PATH, &[]),
    )?;

    let mut timeseries = series.timeseries;
    timeseries.sort_by_key(|point| point.date);

    Ok(RevenueData {
        total_revenue: summary.total_revenue,
        timeseries,
    })
}
