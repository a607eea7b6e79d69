use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Product tiers, ordered by capability. Each tier includes everything the previous one grants.
#[derive(
    Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Plan {
    #[default]
    Free,
    Pro,
    Cloud,
    Power,
}

impl Plan {
    pub const PURCHASABLE: [Plan; 3] = [Plan::Pro, Plan::Cloud, Plan::Power];

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "FREE",
            Plan::Pro => "PRO",
            Plan::Cloud => "CLOUD",
            Plan::Power => "POWER",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "FREE" => Some(Plan::Free),
            "PRO" => Some(Plan::Pro),
            "CLOUD" => Some(Plan::Cloud),
            "POWER" => Some(Plan::Power),
            _ => None,
        }
    }

    pub fn is_purchasable(&self) -> bool {
        *self != Plan::Free
    }
}

impl Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_ordered_by_capability() {
        assert!(Plan::Free < Plan::Pro);
        assert!(Plan::Pro < Plan::Cloud);
        assert!(Plan::Cloud < Plan::Power);
    }

    #[test]
    fn parses_storage_values_only_in_upper_case() {
        assert_eq!(Plan::from_str("CLOUD"), Some(Plan::Cloud));
        assert_eq!(Plan::from_str("cloud"), None);
        assert_eq!(Plan::from_str(""), None);
    }

    #[test]
    fn free_is_never_purchasable() {
        assert!(!Plan::Free.is_purchasable());
        assert!(Plan::PURCHASABLE.iter().all(Plan::is_purchasable));
    }
}
