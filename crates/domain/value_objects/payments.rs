use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{
    enums::{plans::Plan, subscription_periods::SubscriptionPeriod},
    pricing::{PriceQuote, UsdAmount},
};

/// Raw checkout body. Values are validated by the checkout use case so that
/// unknown plans surface as validation errors instead of extractor rejections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub plan: String,
    pub interval: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutResponse {
    pub payment_url: String,
    pub invoice_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuoteDto {
    pub plan: Plan,
    pub interval: SubscriptionPeriod,
    pub base_amount: UsdAmount,
    pub amount: UsdAmount,
    pub discount_percent: u8,
}

impl PriceQuoteDto {
    pub fn from_quote(quote: PriceQuote, discount_percent: u8) -> Self {
        Self {
            plan: quote.plan,
            interval: quote.period,
            base_amount: quote.base,
            amount: quote.amount,
            discount_percent,
        }
    }
}
