//! Pricing strategy and quote handlers.

use axum::{extract::State, Json};
use serde::Serialize;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::AdminKey;
use crate::middleware::metrics::record_price_quote;
use domain::models::{PriceQuote, PriceRequest, PricingStrategy, SaveStrategyRequest, StrategyType};
use shared::money::format_currency;

/// Quote together with the strategy it was priced under.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct QuoteResponse {
    #[serde(flatten)]
    pub quote: PriceQuote,
    /// `None` when no strategy could be loaded and fallback pricing applied.
    pub strategy_type: Option<StrategyType>,
    /// `final_total` formatted for display, e.g. `$1,234.50`.
    pub display_total: String,
}

/// Get the active pricing strategy, provisioning the default when none exists.
///
/// GET /api/v1/pricing/strategy
pub async fn get_strategy(State(state): State<AppState>) -> Result<Json<PricingStrategy>, ApiError> {
    state
        .pricing
        .get_active_strategy()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::ServiceUnavailable("Pricing strategy unavailable".to_string()))
}

/// Replace the active pricing strategy. Requires `X-Admin-Key`.
///
/// PUT /api/v1/pricing/strategy
pub async fn save_strategy(
    State(state): State<AppState>,
    _admin: AdminKey,
    Json(request): Json<SaveStrategyRequest>,
) -> Result<Json<PricingStrategy>, ApiError> {
    request.validate()?;

    if !state.pricing.save_strategy(&request).await {
        return Err(ApiError::Internal("Failed to save pricing strategy".to_string()));
    }

    get_strategy(State(state)).await
}

/// Price a transaction against the active strategy.
///
/// POST /api/v1/pricing/quote
pub async fn quote(
    State(state): State<AppState>,
    Json(request): Json<PriceRequest>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let (quote, strategy_type) = state.pricing.quote(&request).await?;
    record_price_quote(strategy_type.map_or("none", |t| t.as_str()));

    Ok(Json(QuoteResponse {
        display_total: format_currency(quote.final_total),
        quote,
        strategy_type,
    }))
}
