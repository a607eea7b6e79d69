use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriptionPeriod {
    Month,
    Year,
}

impl SubscriptionPeriod {
    pub const ALL: [SubscriptionPeriod; 2] = [SubscriptionPeriod::Month, SubscriptionPeriod::Year];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPeriod::Month => "MONTH",
            SubscriptionPeriod::Year => "YEAR",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "MONTH" => Some(SubscriptionPeriod::Month),
            "YEAR" => Some(SubscriptionPeriod::Year),
            _ => None,
        }
    }

    /// Length of one billing period in calendar months.
    pub fn calendar_months(&self) -> u32 {
        match self {
            SubscriptionPeriod::Month => 1,
            SubscriptionPeriod::Year => 12,
        }
    }
}

impl Display for SubscriptionPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
