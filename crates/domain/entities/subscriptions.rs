use anyhow::Result;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::{
        enums::{
            plans::Plan, subscription_periods::SubscriptionPeriod,
            subscription_statuses::SubscriptionStatus,
        },
        renewal::RenewalPolicy,
    },
    infra::db::postgres::schema::subscriptions,
};

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscriptions, primary_key(user_id))]
pub struct SubscriptionEntity {
    pub user_id: Uuid,
    pub plan: String,
    pub status: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Row written by webhook reconciliation; inserted or overwritten per user.
#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = subscriptions)]
pub struct UpsertSubscriptionEntity {
    pub user_id: Uuid,
    pub plan: String,
    pub status: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// One paid period for a user. The expiry is only fixed once the grant is
/// resolved against the subscription row held by the completing transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionGrant {
    pub user_id: Uuid,
    pub plan: Plan,
    pub period: SubscriptionPeriod,
    pub renewal_policy: RenewalPolicy,
    pub granted_at: DateTime<Utc>,
}

impl SubscriptionGrant {
    pub fn resolve(
        &self,
        current: Option<&SubscriptionEntity>,
    ) -> Result<UpsertSubscriptionEntity> {
        let current_expiry = current
            .filter(|sub| SubscriptionStatus::from_str(&sub.status) == SubscriptionStatus::Active)
            .and_then(|sub| sub.expires_at);

        let expires_at = self
            .renewal_policy
            .next_expiry(self.period, self.granted_at, current_expiry)?;

        Ok(UpsertSubscriptionEntity {
            user_id: self.user_id,
            plan: self.plan.as_str().to_string(),
            status: SubscriptionStatus::Active.to_string(),
            expires_at: Some(expires_at),
            updated_at: self.granted_at,
        })
    }
}
