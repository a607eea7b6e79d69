use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::{
    payments::{InsertPaymentEntity, PaymentEntity},
    subscriptions::{SubscriptionGrant, UpsertSubscriptionEntity},
};

#[automock]
#[async_trait]
pub trait PaymentRepository {
    async fn record_payment(&self, payment: InsertPaymentEntity) -> Result<Uuid>;

    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<PaymentEntity>>;

    /// Moves a PENDING payment to COMPLETED and applies the grant to the owner's
    /// subscription in one transaction, resolving the expiry against the row as
    /// locked there. Returns the written row, or `None` (and writes nothing) when
    /// the payment was no longer PENDING.
    async fn complete_pending_with_subscription(
        &self,
        order_id: Uuid,
        completed_at: DateTime<Utc>,
        grant: SubscriptionGrant,
    ) -> Result<Option<UpsertSubscriptionEntity>>;

    /// Moves a PENDING payment to FAILED. Returns `false` when it was not PENDING.
    async fn fail_pending(&self, order_id: Uuid, failed_at: DateTime<Utc>) -> Result<bool>;
}
