use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error};
use uuid::Uuid;

use crates::domain::{
    entities::subscriptions::SubscriptionEntity,
    repositories::subscriptions::SubscriptionRepository,
    value_objects::{
        entitlements::{EntitlementDto, FeatureMatrix},
        enums::{plans::Plan, subscription_statuses::SubscriptionStatus},
    },
};

pub struct EntitlementUseCase<S>
where
    S: SubscriptionRepository + Send + Sync + 'static,
{
    subscription_repo: Arc<S>,
    features: Arc<FeatureMatrix>,
}

impl<S> EntitlementUseCase<S>
where
    S: SubscriptionRepository + Send + Sync + 'static,
{
    pub fn new(subscription_repo: Arc<S>, features: Arc<FeatureMatrix>) -> Self {
        Self {
            subscription_repo,
            features,
        }
    }

    pub async fn resolve(
        &self,
        user_id: Uuid,
        email: Option<String>,
    ) -> anyhow::Result<EntitlementDto> {
        self.resolve_at(user_id, email, Utc::now()).await
    }

    pub async fn resolve_at(
        &self,
        user_id: Uuid,
        email: Option<String>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<EntitlementDto> {
        let subscription = self
            .subscription_repo
            .find_by_user_id(user_id)
            .await
            .inspect_err(|err| {
                error!(%user_id, db_error = ?err, "entitlements: failed to load subscription");
            })?;

        let entitled = subscription
            .as_ref()
            .and_then(|sub| entitled_plan(sub, now));
        let (plan, expires_at) = match entitled {
            Some((plan, expires_at)) => (plan, Some(expires_at)),
            None => (Plan::Free, None),
        };

        debug!(%user_id, plan = %plan, "entitlements: resolved");

        Ok(EntitlementDto {
            user_id,
            email,
            plan,
            is_premium: plan != Plan::Free,
            expires_at,
            features: self.features.features_for(plan),
        })
    }
}

/// The paid plan a stored row grants at `now`, if any.
fn entitled_plan(
    subscription: &SubscriptionEntity,
    now: DateTime<Utc>,
) -> Option<(Plan, DateTime<Utc>)> {
    if SubscriptionStatus::from_str(&subscription.status) != SubscriptionStatus::Active {
        return None;
    }
    let expires_at = subscription.expires_at.filter(|expiry| *expiry > now)?;
    let plan = Plan::from_str(&subscription.plan).filter(Plan::is_purchasable)?;

    Some((plan, expires_at))
}
