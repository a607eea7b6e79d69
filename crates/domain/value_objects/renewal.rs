use std::fmt::Display;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Months, Utc};

use crate::domain::value_objects::enums::subscription_periods::SubscriptionPeriod;

/// How a successful payment moves the subscription window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenewalPolicy {
    /// The new period starts at the payment, discarding any unused time.
    #[default]
    ResetFromNow,
    /// The new period is appended to an unexpired window.
    ExtendFromCurrentExpiry,
}

impl RenewalPolicy {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reset" => Some(RenewalPolicy::ResetFromNow),
            "extend" => Some(RenewalPolicy::ExtendFromCurrentExpiry),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RenewalPolicy::ResetFromNow => "reset",
            RenewalPolicy::ExtendFromCurrentExpiry => "extend",
        }
    }

    /// Whether the current expiry must be read before computing the next one.
    pub fn reads_current_expiry(&self) -> bool {
        matches!(self, RenewalPolicy::ExtendFromCurrentExpiry)
    }

    /// End of the paid window. Calendar arithmetic clamps to the last day of
    /// shorter months: Jan 31 + 1 month is Feb 28 (or 29), Feb 29 + 1 year is Feb 28.
    pub fn next_expiry(
        &self,
        period: SubscriptionPeriod,
        now: DateTime<Utc>,
        current_expiry: Option<DateTime<Utc>>,
    ) -> Result<DateTime<Utc>> {
        let start = match (self, current_expiry) {
            (RenewalPolicy::ExtendFromCurrentExpiry, Some(expiry)) if expiry > now => expiry,
            _ => now,
        };

        start
            .checked_add_months(Months::new(period.calendar_months()))
            .ok_or_else(|| {
                anyhow!("subscription expiry overflows the calendar: {start} + {period}")
            })
    }
}

impl Display for RenewalPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
