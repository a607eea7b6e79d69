use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{Connection, OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::{
        postgres::{postgres_connection::PgPoolSquad, schema::payments},
        repositories::subscriptions::apply_grant,
    },
};
use domain::{
    entities::{
        payments::{InsertPaymentEntity, PaymentEntity},
        subscriptions::{SubscriptionGrant, UpsertSubscriptionEntity},
    },
    repositories::payments::PaymentRepository,
    value_objects::enums::payment_statuses::PaymentStatus,
};

pub struct PaymentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

/// Guarded status transition: only rows still PENDING are touched.
fn transition_pending(
    conn: &mut PgConnection,
    order_id: Uuid,
    next: PaymentStatus,
    at: DateTime<Utc>,
) -> QueryResult<usize> {
    update(payments::table)
        .filter(payments::id.eq(order_id))
        .filter(payments::status.eq(PaymentStatus::Pending.as_str()))
        .set((
            payments::status.eq(next.as_str()),
            payments::updated_at.eq(at),
        ))
        .execute(conn)
}

#[async_trait]
impl PaymentRepository for PaymentPostgres {
    async fn record_payment(&self, payment: InsertPaymentEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let payment_id = insert_into(payments::table)
            .values(&payment)
            .returning(payments::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(payment_id)
    }

    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let payment = payments::table
            .filter(payments::id.eq(order_id))
            .select(PaymentEntity::as_select())
            .first::<PaymentEntity>(&mut conn)
            .optional()?;

        Ok(payment)
    }

    async fn complete_pending_with_subscription(
        &self,
        order_id: Uuid,
        completed_at: DateTime<Utc>,
        grant: SubscriptionGrant,
    ) -> Result<Option<UpsertSubscriptionEntity>> {
        let mut pooled = Arc::clone(&self.db_pool).get()?;
        let conn: &mut PgConnection = &mut pooled;

        let applied = conn.transaction::<_, anyhow::Error, _>(|conn| {
            let updated =
                transition_pending(conn, order_id, PaymentStatus::Completed, completed_at)?;
            if updated == 0 {
                return Ok(None);
            }

            apply_grant(conn, &grant).map(Some)
        })?;

        Ok(applied)
    }

    async fn fail_pending(&self, order_id: Uuid, failed_at: DateTime<Utc>) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = transition_pending(&mut conn, order_id, PaymentStatus::Failed, failed_at)?;

        Ok(updated > 0)
    }
}
