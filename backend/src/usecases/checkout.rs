use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crates::{
    domain::{
        entities::payments::InsertPaymentEntity,
        repositories::payments::PaymentRepository,
        value_objects::{
            enums::{
                payment_statuses::PaymentStatus, plans::Plan,
                subscription_periods::SubscriptionPeriod,
            },
            payments::{CheckoutRequest, CheckoutResponse},
            pricing::PriceTable,
        },
    },
    payments::nowpayments_client::{
        CreatedInvoice, InvoiceGatewayError, InvoiceOrder, NowPaymentsClient,
    },
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InvoiceGateway: Send + Sync {
    async fn create_invoice(
        &self,
        order: &InvoiceOrder,
    ) -> Result<CreatedInvoice, InvoiceGatewayError>;
}

#[async_trait]
impl InvoiceGateway for NowPaymentsClient {
    async fn create_invoice(
        &self,
        order: &InvoiceOrder,
    ) -> Result<CreatedInvoice, InvoiceGatewayError> {
        self.create_invoice(order).await
    }
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("{0}")]
    Validation(String),
    #[error("payment provider is not configured")]
    NotConfigured,
    #[error("payment provider error: {0}")]
    Upstream(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CheckoutError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CheckoutError::Validation(_) => StatusCode::BAD_REQUEST,
            CheckoutError::Upstream(_) => StatusCode::BAD_GATEWAY,
            CheckoutError::NotConfigured | CheckoutError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type CheckoutResult<T> = std::result::Result<T, CheckoutError>;

pub struct CheckoutUseCase<Pay, Gw>
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Gw: InvoiceGateway + 'static,
{
    payment_repo: Arc<Pay>,
    invoice_gateway: Arc<Gw>,
    price_table: Arc<PriceTable>,
}

impl<Pay, Gw> CheckoutUseCase<Pay, Gw>
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Gw: InvoiceGateway + 'static,
{
    pub fn new(
        payment_repo: Arc<Pay>,
        invoice_gateway: Arc<Gw>,
        price_table: Arc<PriceTable>,
    ) -> Self {
        Self {
            payment_repo,
            invoice_gateway,
            price_table,
        }
    }

    /// Creates a provider invoice and records the PENDING payment behind it.
    /// Nothing is written unless the provider accepted the invoice.
    pub async fn create_checkout(
        &self,
        user_id: Uuid,
        request: CheckoutRequest,
    ) -> CheckoutResult<CheckoutResponse> {
        info!(
            %user_id,
            plan = %request.plan,
            interval = %request.interval,
            "checkout: requested"
        );

        let (plan, period) = parse_selection(&request).inspect_err(|err| {
            warn!(
                %user_id,
                status = err.status_code().as_u16(),
                error = %err,
                "checkout: rejected selection"
            );
        })?;

        let quote = self.price_table.quote(plan, period).ok_or_else(|| {
            CheckoutError::Validation(format!("{plan} is not sold per {period}"))
        })?;
        let amount_minor = i32::try_from(quote.amount.cents())
            .map_err(|_| anyhow::anyhow!("price for {plan}/{period} does not fit the ledger"))?;

        let order = InvoiceOrder {
            order_id: Uuid::new_v4(),
            amount: quote.amount,
            description: format!("PassGen {plan} Plan ({period})"),
        };

        let invoice = self
            .invoice_gateway
            .create_invoice(&order)
            .await
            .map_err(|err| match err {
                InvoiceGatewayError::NotConfigured => {
                    error!(%user_id, "checkout: payment provider api key is not configured");
                    CheckoutError::NotConfigured
                }
                other => {
                    error!(
                        %user_id,
                        order_id = %order.order_id,
                        error = %other,
                        "checkout: invoice creation failed"
                    );
                    CheckoutError::Upstream(other.to_string())
                }
            })?;

        self.payment_repo
            .record_payment(InsertPaymentEntity {
                id: order.order_id,
                user_id,
                plan: plan.as_str().to_string(),
                subscription_period: period.as_str().to_string(),
                amount_minor,
                provider_invoice_id: Some(invoice.invoice_id.clone()),
                status: PaymentStatus::Pending.as_str().to_string(),
            })
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    order_id = %order.order_id,
                    invoice_id = %invoice.invoice_id,
                    db_error = ?err,
                    "checkout: failed to record pending payment"
                );
                CheckoutError::Internal(err)
            })?;

        info!(
            %user_id,
            order_id = %order.order_id,
            invoice_id = %invoice.invoice_id,
            amount = %quote.amount,
            "checkout: invoice created"
        );

        Ok(CheckoutResponse {
            payment_url: invoice.invoice_url,
            invoice_id: invoice.invoice_id,
        })
    }
}

fn parse_selection(request: &CheckoutRequest) -> CheckoutResult<(Plan, SubscriptionPeriod)> {
    let plan = Plan::from_str(request.plan.trim())
        .filter(Plan::is_purchasable)
        .ok_or_else(|| CheckoutError::Validation("plan must be one of PRO, CLOUD, POWER".into()))?;
    let period = SubscriptionPeriod::from_str(request.interval.trim())
        .ok_or_else(|| CheckoutError::Validation("interval must be MONTH or YEAR".into()))?;

    Ok((plan, period))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crates::domain::repositories::payments::MockPaymentRepository;
    use mockall::predicate::always;

    fn request(plan: &str, interval: &str) -> CheckoutRequest {
        CheckoutRequest {
            plan: plan.to_string(),
            interval: interval.to_string(),
        }
    }

    fn usecase(
        payment_repo: MockPaymentRepository,
        gateway: MockInvoiceGateway,
    ) -> CheckoutUseCase<MockPaymentRepository, MockInvoiceGateway> {
        CheckoutUseCase::new(
            Arc::new(payment_repo),
            Arc::new(gateway),
            Arc::new(PriceTable::default()),
        )
    }

    #[tokio::test]
    async fn records_pending_payment_after_invoice_is_created() {
        let user_id = Uuid::new_v4();

        let mut gateway = MockInvoiceGateway::new();
        gateway
            .expect_create_invoice()
            .withf(|order| {
                order.amount.cents() == 569 && order.description == "PassGen PRO Plan (MONTH)"
            })
            .times(1)
            .returning(|_| {
                Ok(CreatedInvoice {
                    invoice_id: "4522625843".to_string(),
                    invoice_url: "https://nowpayments.io/payment/?iid=4522625843".to_string(),
                })
            });

        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_record_payment()
            .withf(move |payment| {
                payment.user_id == user_id
                    && payment.plan == "PRO"
                    && payment.subscription_period == "MONTH"
                    && payment.amount_minor == 569
                    && payment.status == "PENDING"
                    && payment.provider_invoice_id.as_deref() == Some("4522625843")
            })
            .times(1)
            .returning(|payment| Ok(payment.id));

        let response = usecase(payment_repo, gateway)
            .create_checkout(user_id, request("PRO", "MONTH"))
            .await
            .unwrap();

        assert_eq!(
            response,
            CheckoutResponse {
                payment_url: "https://nowpayments.io/payment/?iid=4522625843".to_string(),
                invoice_id: "4522625843".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn yearly_power_uses_discounted_yearly_price() {
        let mut gateway = MockInvoiceGateway::new();
        gateway
            .expect_create_invoice()
            .withf(|order| {
                order.amount.cents() == 12255 && order.description == "PassGen POWER Plan (YEAR)"
            })
            .returning(|order| {
                Ok(CreatedInvoice {
                    invoice_id: "inv".to_string(),
                    invoice_url: format!("https://pay.example/{}", order.order_id),
                })
            });

        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_record_payment()
            .withf(|payment| payment.amount_minor == 12255)
            .returning(|payment| Ok(payment.id));

        let result = usecase(payment_repo, gateway)
            .create_checkout(Uuid::new_v4(), request("POWER", "YEAR"))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn invalid_selection_never_reaches_the_provider() {
        let rejected = [
            ("FREE", "MONTH"),
            ("ENTERPRISE", "MONTH"),
            ("PRO", "WEEK"),
            ("pro", "MONTH"),
        ];
        for (plan, interval) in rejected {
            let mut gateway = MockInvoiceGateway::new();
            gateway.expect_create_invoice().never();
            let mut payment_repo = MockPaymentRepository::new();
            payment_repo.expect_record_payment().never();

            let err = usecase(payment_repo, gateway)
                .create_checkout(Uuid::new_v4(), request(plan, interval))
                .await
                .unwrap_err();

            assert!(matches!(err, CheckoutError::Validation(_)), "{plan}/{interval}");
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn provider_rejection_creates_no_record() {
        let mut gateway = MockInvoiceGateway::new();
        gateway
            .expect_create_invoice()
            .with(always())
            .returning(|_| Err(InvoiceGatewayError::Rejected { status: 400 }));
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo.expect_record_payment().never();

        let err = usecase(payment_repo, gateway)
            .create_checkout(Uuid::new_v4(), request("CLOUD", "MONTH"))
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::Upstream(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn missing_api_key_fails_closed() {
        let mut gateway = MockInvoiceGateway::new();
        gateway
            .expect_create_invoice()
            .returning(|_| Err(InvoiceGatewayError::NotConfigured));
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo.expect_record_payment().never();

        let err = usecase(payment_repo, gateway)
            .create_checkout(Uuid::new_v4(), request("PRO", "YEAR"))
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::NotConfigured));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn ledger_failure_is_internal() {
        let mut gateway = MockInvoiceGateway::new();
        gateway.expect_create_invoice().returning(|_| {
            Ok(CreatedInvoice {
                invoice_id: "inv".to_string(),
                invoice_url: "https://pay.example/inv".to_string(),
            })
        });
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_record_payment()
            .returning(|_| Err(anyhow::anyhow!("connection refused")));

        let err = usecase(payment_repo, gateway)
            .create_checkout(Uuid::new_v4(), request("PRO", "MONTH"))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
