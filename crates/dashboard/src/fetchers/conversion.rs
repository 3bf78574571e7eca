use storesight_core::ConversionData;

use super::FetchContext;
use crate::api::{ApiError, CONVERSION_PATH, Transport};

pub(super) async fn load<T: Transport>(ctx: &FetchContext<T>) -> Result<ConversionData, ApiError> {
    ctx.get(CONVERSION_PATH, &[]).await
}
