use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, upsert::excluded};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::subscriptions},
};
use domain::{
    entities::subscriptions::{SubscriptionEntity, SubscriptionGrant, UpsertSubscriptionEntity},
    repositories::subscriptions::SubscriptionRepository,
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

/// Inserts the user's subscription or overwrites plan, status and window in place.
fn upsert_subscription(
    conn: &mut PgConnection,
    subscription: &UpsertSubscriptionEntity,
) -> QueryResult<usize> {
    insert_into(subscriptions::table)
        .values(subscription)
        .on_conflict(subscriptions::user_id)
        .do_update()
        .set((
            subscriptions::plan.eq(excluded(subscriptions::plan)),
            subscriptions::status.eq(excluded(subscriptions::status)),
            subscriptions::expires_at.eq(excluded(subscriptions::expires_at)),
            subscriptions::updated_at.eq(excluded(subscriptions::updated_at)),
        ))
        .execute(conn)
}

fn lock_subscription(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> QueryResult<Option<SubscriptionEntity>> {
    subscriptions::table
        .filter(subscriptions::user_id.eq(user_id))
        .select(SubscriptionEntity::as_select())
        .for_update()
        .first::<SubscriptionEntity>(conn)
        .optional()
}

/// Applies a paid period inside the caller's transaction.
///
/// Policies that build on the current expiry hold the user's row lock while
/// computing the new window, so concurrent completions stack. A user with no
/// row yet has nothing to lock: the first insert wins and a racing completion
/// falls through to the locked read once that insert has committed.
pub(crate) fn apply_grant(
    conn: &mut PgConnection,
    grant: &SubscriptionGrant,
) -> Result<UpsertSubscriptionEntity> {
    if !grant.renewal_policy.reads_current_expiry() {
        let row = grant.resolve(None)?;
        upsert_subscription(conn, &row)?;
        return Ok(row);
    }

    let mut current = lock_subscription(conn, grant.user_id)?;
    if current.is_none() {
        let fresh = grant.resolve(None)?;
        let inserted = insert_into(subscriptions::table)
            .values(&fresh)
            .on_conflict(subscriptions::user_id)
            .do_nothing()
            .execute(conn)?;
        if inserted == 1 {
            return Ok(fresh);
        }
        current = lock_subscription(conn, grant.user_id)?;
    }

    let row = grant.resolve(current.as_ref())?;
    upsert_subscription(conn, &row)?;
    Ok(row)
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let subscription = subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(subscription)
    }
}
