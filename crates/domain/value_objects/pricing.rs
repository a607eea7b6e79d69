use std::{collections::HashMap, fmt::Display};

use anyhow::{Result, bail};
use serde::{Serialize, Serializer};

use crate::domain::value_objects::enums::{plans::Plan, subscription_periods::SubscriptionPeriod};

/// Fixed-point USD amount stored in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UsdAmount(i64);

impl UsdAmount {
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Applies a percentage discount, rounding half away from zero to whole cents.
    pub fn discounted(&self, percent: u8) -> Self {
        let scaled = self.0 * i64::from(100 - percent.min(100));
        let rounded = if scaled >= 0 {
            (scaled + 50) / 100
        } else {
            (scaled - 50) / 100
        };
        Self(rounded)
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl Display for UsdAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

// Providers expect a JSON number, e.g. `5.69`.
impl Serialize for UsdAmount {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(self.as_f64())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceQuote {
    pub plan: Plan,
    pub period: SubscriptionPeriod,
    pub base: UsdAmount,
    pub amount: UsdAmount,
}

/// Immutable plan x period price list plus the flat checkout discount.
#[derive(Debug, Clone)]
pub struct PriceTable {
    base_prices: HashMap<(Plan, SubscriptionPeriod), UsdAmount>,
    discount_percent: u8,
}

impl PriceTable {
    pub const DEFAULT_DISCOUNT_PERCENT: u8 = 5;

    pub fn new(
        base_prices: HashMap<(Plan, SubscriptionPeriod), UsdAmount>,
        discount_percent: u8,
    ) -> Result<Self> {
        if discount_percent > 100 {
            bail!("discount percent must be between 0 and 100, got {discount_percent}");
        }
        if base_prices.contains_key(&(Plan::Free, SubscriptionPeriod::Month))
            || base_prices.contains_key(&(Plan::Free, SubscriptionPeriod::Year))
        {
            bail!("the free plan cannot carry a price");
        }

        Ok(Self {
            base_prices,
            discount_percent,
        })
    }

    pub fn with_discount(discount_percent: u8) -> Result<Self> {
        Self::new(standard_base_prices(), discount_percent)
    }

    pub fn discount_percent(&self) -> u8 {
        self.discount_percent
    }

    pub fn quote(&self, plan: Plan, period: SubscriptionPeriod) -> Option<PriceQuote> {
        let base = *self.base_prices.get(&(plan, period))?;
        Some(PriceQuote {
            plan,
            period,
            base,
            amount: base.discounted(self.discount_percent),
        })
    }

    /// All purchasable quotes in tier order, monthly before yearly.
    pub fn quotes(&self) -> Vec<PriceQuote> {
        Plan::PURCHASABLE
            .iter()
            .flat_map(|plan| {
                SubscriptionPeriod::ALL
                    .iter()
                    .filter_map(move |period| self.quote(*plan, *period))
            })
            .collect()
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            base_prices: standard_base_prices(),
            discount_percent: Self::DEFAULT_DISCOUNT_PERCENT,
        }
    }
}

fn standard_base_prices() -> HashMap<(Plan, SubscriptionPeriod), UsdAmount> {
    HashMap::from([
        ((Plan::Pro, SubscriptionPeriod::Month), UsdAmount::from_cents(599)),
        ((Plan::Pro, SubscriptionPeriod::Year), UsdAmount::from_cents(5_900)),
        ((Plan::Cloud, SubscriptionPeriod::Month), UsdAmount::from_cents(899)),
        ((Plan::Cloud, SubscriptionPeriod::Year), UsdAmount::from_cents(8_900)),
        ((Plan::Power, SubscriptionPeriod::Month), UsdAmount::from_cents(1_299)),
        ((Plan::Power, SubscriptionPeriod::Year), UsdAmount::from_cents(12_900)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_percent_discount_matches_published_prices() {
        let table = PriceTable::default();
        let expected = [
            (Plan::Pro, SubscriptionPeriod::Month, 569),
            (Plan::Pro, SubscriptionPeriod::Year, 5_605),
            (Plan::Cloud, SubscriptionPeriod::Month, 854),
            (Plan::Cloud, SubscriptionPeriod::Year, 8_455),
            (Plan::Power, SubscriptionPeriod::Month, 1_234),
            (Plan::Power, SubscriptionPeriod::Year, 12_255),
        ];

        for (plan, period, cents) in expected {
            let quote = table.quote(plan, period).unwrap();
            assert_eq!(quote.amount.cents(), cents, "{plan}/{period}");
        }
    }

    #[test]
    fn discount_rounds_half_away_from_zero() {
        // 0.95 * 10 cents = 9.5 cents
        assert_eq!(UsdAmount::from_cents(10).discounted(5).cents(), 10);
        // 0.95 * 1 cent = 0.95 cents
        assert_eq!(UsdAmount::from_cents(1).discounted(5).cents(), 1);
        assert_eq!(UsdAmount::from_cents(599).discounted(0).cents(), 599);
        assert_eq!(UsdAmount::from_cents(599).discounted(100).cents(), 0);
    }

    #[test]
    fn free_plan_has_no_quote() {
        let table = PriceTable::default();
        assert!(table.quote(Plan::Free, SubscriptionPeriod::Month).is_none());
        assert_eq!(table.quotes().len(), 6);
    }

    #[test]
    fn amount_formats_with_two_decimals() {
        assert_eq!(UsdAmount::from_cents(569).to_string(), "5.69");
        assert_eq!(UsdAmount::from_cents(5_900).to_string(), "59.00");
        assert_eq!(UsdAmount::from_cents(5).to_string(), "0.05");
        assert_eq!(
            serde_json::to_string(&UsdAmount::from_cents(569)).unwrap(),
            "5.69"
        );
    }

    #[test]
    fn rejects_invalid_configuration() {
        assert!(PriceTable::with_discount(101).is_err());

        let priced_free = HashMap::from([(
            (Plan::Free, SubscriptionPeriod::Month),
            UsdAmount::from_cents(100),
        )]);
        assert!(PriceTable::new(priced_free, 5).is_err());
    }

    #[test]
    fn alternate_price_lists_can_be_injected() {
        let prices = HashMap::from([(
            (Plan::Pro, SubscriptionPeriod::Month),
            UsdAmount::from_cents(1_000),
        )]);
        let table = PriceTable::new(prices, 10).unwrap();

        let quote = table.quote(Plan::Pro, SubscriptionPeriod::Month).unwrap();
        assert_eq!(quote.amount.cents(), 900);
        assert!(table.quote(Plan::Cloud, SubscriptionPeriod::Month).is_none());
    }
}
