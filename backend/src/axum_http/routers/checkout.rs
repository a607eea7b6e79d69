use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
    routing::post,
};
use crates::{
    domain::{
        repositories::payments::PaymentRepository,
        value_objects::{payments::CheckoutRequest, pricing::PriceTable},
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad, repositories::payments::PaymentPostgres,
    },
    payments::nowpayments_client::NowPaymentsClient,
};

use crate::{
    auth::AuthUser,
    axum_http::error_responses::AppError,
    usecases::checkout::{CheckoutUseCase, InvoiceGateway},
};

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    invoice_client: Arc<NowPaymentsClient>,
    price_table: Arc<PriceTable>,
) -> Router {
    let payment_repository = PaymentPostgres::new(db_pool);
    let checkout_usecase =
        CheckoutUseCase::new(Arc::new(payment_repository), invoice_client, price_table);

    router(Arc::new(checkout_usecase))
}

pub fn router<Pay, Gw>(usecase: Arc<CheckoutUseCase<Pay, Gw>>) -> Router
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Gw: InvoiceGateway + 'static,
{
    Router::new()
        .route("/api/checkout", post(create_checkout::<Pay, Gw>))
        .with_state(usecase)
}

pub async fn create_checkout<Pay, Gw>(
    State(usecase): State<Arc<CheckoutUseCase<Pay, Gw>>>,
    auth: AuthUser,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError>
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Gw: InvoiceGateway + 'static,
{
    let Json(request) = payload?;
    let response = usecase.create_checkout(auth.user_id, request).await?;

    Ok(Json(response))
}
