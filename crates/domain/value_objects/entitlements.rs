use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::enums::plans::Plan;

/// Capabilities unlocked in the desktop app. Derived from the plan, never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlanFeatures {
    pub unlimited_vault: bool,
    pub dev_tools: bool,
    pub env_inject: bool,
    pub cloud_sync: bool,
    pub s3_byos: bool,
}

impl PlanFeatures {
    pub const NONE: PlanFeatures = PlanFeatures {
        unlimited_vault: false,
        dev_tools: false,
        env_inject: false,
        cloud_sync: false,
        s3_byos: false,
    };

    /// True when every flag enabled here is also enabled in `other`.
    pub fn is_subset_of(&self, other: &PlanFeatures) -> bool {
        let pairs = [
            (self.unlimited_vault, other.unlimited_vault),
            (self.dev_tools, other.dev_tools),
            (self.env_inject, other.env_inject),
            (self.cloud_sync, other.cloud_sync),
            (self.s3_byos, other.s3_byos),
        ];
        pairs.iter().all(|(mine, theirs)| !mine || *theirs)
    }
}

/// Immutable plan -> feature flag mapping injected into the entitlement resolver.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    by_plan: HashMap<Plan, PlanFeatures>,
}

impl FeatureMatrix {
    pub fn new(by_plan: HashMap<Plan, PlanFeatures>) -> Self {
        Self { by_plan }
    }

    /// Plans missing from the matrix get no features.
    pub fn features_for(&self, plan: Plan) -> PlanFeatures {
        self.by_plan.get(&plan).copied().unwrap_or(PlanFeatures::NONE)
    }
}

impl Default for FeatureMatrix {
    fn default() -> Self {
        let pro = PlanFeatures {
            unlimited_vault: true,
            dev_tools: true,
            env_inject: true,
            ..PlanFeatures::NONE
        };
        let cloud = PlanFeatures {
            cloud_sync: true,
            ..pro
        };
        let power = PlanFeatures {
            s3_byos: true,
            ..cloud
        };

        Self::new(HashMap::from([
            (Plan::Free, PlanFeatures::NONE),
            (Plan::Pro, pro),
            (Plan::Cloud, cloud),
            (Plan::Power, power),
        ]))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementDto {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub plan: Plan,
    pub is_premium: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub features: PlanFeatures,
}
