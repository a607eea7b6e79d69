use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use crates::{
    domain::{
        repositories::subscriptions::SubscriptionRepository,
        value_objects::entitlements::FeatureMatrix,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::subscriptions::SubscriptionPostgres,
    },
};

use crate::{
    auth::AuthUser, axum_http::error_responses::AppError,
    usecases::entitlements::EntitlementUseCase,
};

pub fn routes(db_pool: Arc<PgPoolSquad>, features: Arc<FeatureMatrix>) -> Router {
    let subscription_repository = SubscriptionPostgres::new(db_pool);
    let entitlement_usecase = EntitlementUseCase::new(Arc::new(subscription_repository), features);

    router(Arc::new(entitlement_usecase))
}

pub fn router<S>(usecase: Arc<EntitlementUseCase<S>>) -> Router
where
    S: SubscriptionRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/api/me", get(current_entitlements::<S>))
        .with_state(usecase)
}

pub async fn current_entitlements<S>(
    State(usecase): State<Arc<EntitlementUseCase<S>>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError>
where
    S: SubscriptionRepository + Send + Sync + 'static,
{
    let entitlements = usecase.resolve(auth.user_id, auth.email).await?;

    Ok(Json(entitlements))
}
