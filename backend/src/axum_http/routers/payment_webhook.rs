use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
};
use crates::{
    domain::{repositories::payments::PaymentRepository, value_objects::renewal::RenewalPolicy},
    infra::db::{
        postgres::postgres_connection::PgPoolSquad, repositories::payments::PaymentPostgres,
    },
    payments::{ipn_signature::IpnVerifier, nowpayments_client::IPN_CALLBACK_PATH},
};
use serde_json::json;
use tracing::info;

use crate::{
    axum_http::error_responses::AppError, usecases::payment_webhook::PaymentWebhookUseCase,
};

pub const SIGNATURE_HEADER: &str = "x-nowpayments-sig";

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    verifier: Arc<IpnVerifier>,
    renewal_policy: RenewalPolicy,
) -> Router {
    let payment_repository = PaymentPostgres::new(db_pool);
    let webhook_usecase =
        PaymentWebhookUseCase::new(Arc::new(payment_repository), verifier, renewal_policy);

    router(Arc::new(webhook_usecase))
}

pub fn router<Pay>(usecase: Arc<PaymentWebhookUseCase<Pay>>) -> Router
where
    Pay: PaymentRepository + Send + Sync + 'static,
{
    Router::new()
        .route(IPN_CALLBACK_PATH, post(nowpayments_ipn::<Pay>))
        .with_state(usecase)
}

/// Takes the raw body: the signature covers the provider's exact JSON.
pub async fn nowpayments_ipn<Pay>(
    State(usecase): State<Arc<PaymentWebhookUseCase<Pay>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError>
where
    Pay: PaymentRepository + Send + Sync + 'static,
{
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = usecase.handle_ipn(&body, signature).await?;
    info!(%outcome, "payment_webhook: delivery acknowledged");

    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axum_http::routers::test_support::send;
    use axum::{body::Body, http::Request};
    use chrono::Utc;
    use crates::{
        domain::{entities::payments::PaymentEntity, repositories::payments::MockPaymentRepository},
        payments::ipn_signature::sign,
    };
    use uuid::Uuid;

    const IPN_SECRET: &str = "ipn-secret-for-tests";

    fn app(payment_repo: MockPaymentRepository) -> Router {
        router(Arc::new(PaymentWebhookUseCase::new(
            Arc::new(payment_repo),
            Arc::new(IpnVerifier::new(Some(IPN_SECRET.to_string()))),
            RenewalPolicy::ResetFromNow,
        )))
    }

    fn delivery(body: &str, signature: Option<String>) -> Request<Body> {
        let mut request = Request::builder()
            .method("POST")
            .uri("/api/webhooks/nowpayments")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }
        request.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn verified_success_is_acknowledged() {
        let order_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo.expect_find_by_id().returning(move |_| {
            let now = Utc::now();
            Ok(Some(PaymentEntity {
                id: order_id,
                user_id,
                plan: "PRO".to_string(),
                subscription_period: "MONTH".to_string(),
                amount_minor: 569,
                provider_invoice_id: None,
                status: "PENDING".to_string(),
                created_at: now,
                updated_at: now,
            }))
        });
        payment_repo
            .expect_complete_pending_with_subscription()
            .times(1)
            .returning(|_, _, grant| Ok(Some(grant.resolve(None).unwrap())));

        let body =
            json!({ "payment_status": "finished", "order_id": order_id.to_string() }).to_string();
        let signature = sign(IPN_SECRET, body.as_bytes()).unwrap();

        let (status, response) = send(app(payment_repo), delivery(&body, Some(signature))).await;

        assert_eq!(status, 200);
        assert_eq!(response, json!({ "success": true }));
    }

    #[tokio::test]
    async fn unknown_order_is_still_acknowledged() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo.expect_find_by_id().returning(|_| Ok(None));

        let body = json!({ "order_id": Uuid::new_v4().to_string(), "payment_status": "finished" })
            .to_string();
        let signature = sign(IPN_SECRET, body.as_bytes()).unwrap();

        let (status, response) = send(app(payment_repo), delivery(&body, Some(signature))).await;

        assert_eq!(status, 200);
        assert_eq!(response["success"], true);
    }

    #[tokio::test]
    async fn bad_signature_is_unauthorized_and_changes_nothing() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo.expect_find_by_id().never();
        payment_repo.expect_complete_pending_with_subscription().never();

        let body = json!({ "order_id": Uuid::new_v4().to_string(), "payment_status": "finished" })
            .to_string();
        let signature = sign("guessed-secret", body.as_bytes()).unwrap();

        let (status, response) = send(app(payment_repo), delivery(&body, Some(signature))).await;

        assert_eq!(status, 401);
        assert_eq!(response["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn missing_header_and_non_object_body_are_bad_requests() {
        let (status, _) = send(
            app(MockPaymentRepository::new()),
            delivery(r#"{"order_id":"x","payment_status":"finished"}"#, None),
        )
        .await;
        assert_eq!(status, 400);

        let (status, _) = send(
            app(MockPaymentRepository::new()),
            delivery("[1,2,3]", Some("00".to_string())),
        )
        .await;
        assert_eq!(status, 400);
    }
}
