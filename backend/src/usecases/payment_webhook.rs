use std::{fmt::Display, sync::Arc};

use anyhow::anyhow;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crates::{
    domain::{
        entities::{payments::PaymentEntity, subscriptions::SubscriptionGrant},
        repositories::payments::PaymentRepository,
        value_objects::{
            enums::{
                payment_statuses::PaymentStatus, plans::Plan,
                subscription_periods::SubscriptionPeriod,
            },
            payment_webhook::{IpnDisposition, IpnNotification},
            renewal::RenewalPolicy,
        },
    },
    payments::ipn_signature::{IpnSignatureError, IpnVerifier},
};

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing x-nowpayments-sig header")]
    MissingSignature,
    #[error("ipn secret is not configured")]
    NotConfigured,
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),
    #[error("invalid webhook signature")]
    InvalidSignature,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::MissingSignature | WebhookError::InvalidPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,
            WebhookError::NotConfigured | WebhookError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// What a verified notification did. Every outcome is acknowledged to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Completed,
    Failed,
    AlreadyProcessed,
    UnknownOrder,
    Ignored,
}

impl Display for WebhookOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let outcome = match self {
            WebhookOutcome::Completed => "completed",
            WebhookOutcome::Failed => "failed",
            WebhookOutcome::AlreadyProcessed => "already_processed",
            WebhookOutcome::UnknownOrder => "unknown_order",
            WebhookOutcome::Ignored => "ignored",
        };
        f.write_str(outcome)
    }
}

pub type WebhookResult<T> = std::result::Result<T, WebhookError>;

pub struct PaymentWebhookUseCase<Pay>
where
    Pay: PaymentRepository + Send + Sync + 'static,
{
    payment_repo: Arc<Pay>,
    verifier: Arc<IpnVerifier>,
    renewal_policy: RenewalPolicy,
}

impl<Pay> PaymentWebhookUseCase<Pay>
where
    Pay: PaymentRepository + Send + Sync + 'static,
{
    pub fn new(
        payment_repo: Arc<Pay>,
        verifier: Arc<IpnVerifier>,
        renewal_policy: RenewalPolicy,
    ) -> Self {
        Self {
            payment_repo,
            verifier,
            renewal_policy,
        }
    }

    /// Verifies the raw delivery and reconciles it. Nothing is read from the
    /// body, and nothing is written, before the signature checks out.
    pub async fn handle_ipn(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> WebhookResult<WebhookOutcome> {
        if !self.verifier.is_configured() {
            error!("payment_webhook: ipn secret is not configured; rejecting delivery");
            return Err(WebhookError::NotConfigured);
        }

        let signature = signature
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                warn!("payment_webhook: delivery without signature header");
                WebhookError::MissingSignature
            })?;

        let body = self
            .verifier
            .verify(payload, signature)
            .map_err(|err| {
                let mapped = match err {
                    IpnSignatureError::NotConfigured => WebhookError::NotConfigured,
                    IpnSignatureError::MalformedBody(reason) => {
                        WebhookError::InvalidPayload(reason)
                    }
                    IpnSignatureError::MalformedSignature | IpnSignatureError::Mismatch => {
                        WebhookError::InvalidSignature
                    }
                };
                warn!(
                    status = mapped.status_code().as_u16(),
                    error = %mapped,
                    "payment_webhook: verification failed"
                );
                mapped
            })?;

        let notification: IpnNotification = serde_json::from_value(Value::Object(body))
            .map_err(|err| {
                warn!(error = %err, "payment_webhook: verified body is missing required fields");
                WebhookError::InvalidPayload(err.to_string())
            })?;

        self.reconcile(&notification, Utc::now()).await
    }

    /// Applies a verified notification to the ledger as of `now`.
    pub async fn reconcile(
        &self,
        notification: &IpnNotification,
        now: DateTime<Utc>,
    ) -> WebhookResult<WebhookOutcome> {
        let status = notification.status();
        let provider_payment_id = notification.provider_payment_id();
        let provider_invoice_id = notification.provider_invoice_id();
        info!(
            order_id = %notification.order_id,
            payment_status = %status,
            provider_payment_id = ?provider_payment_id,
            provider_invoice_id = ?provider_invoice_id,
            "payment_webhook: notification verified"
        );

        let disposition = status.disposition();
        if disposition == IpnDisposition::InProgress {
            debug!(
                order_id = %notification.order_id,
                payment_status = %status,
                "payment_webhook: intermediate status; nothing to apply"
            );
            return Ok(WebhookOutcome::Ignored);
        }

        let Ok(order_id) = Uuid::parse_str(notification.order_id.trim()) else {
            warn!(
                order_id = %notification.order_id,
                "payment_webhook: order id is not one of ours; acknowledging"
            );
            return Ok(WebhookOutcome::UnknownOrder);
        };

        let payment = self
            .payment_repo
            .find_by_id(order_id)
            .await
            .map_err(|err| {
                error!(%order_id, db_error = ?err, "payment_webhook: failed to load payment");
                WebhookError::Internal(err)
            })?;

        let Some(payment) = payment else {
            warn!(%order_id, "payment_webhook: no payment for order; acknowledging");
            return Ok(WebhookOutcome::UnknownOrder);
        };

        match (&provider_invoice_id, &payment.provider_invoice_id) {
            (Some(received), Some(recorded)) if received != recorded => warn!(
                %order_id,
                received_invoice_id = %received,
                recorded_invoice_id = %recorded,
                "payment_webhook: invoice id differs from the one recorded at checkout"
            ),
            _ => {}
        }

        if PaymentStatus::from_str(&payment.status).is_none_or(|status| status.is_terminal()) {
            info!(
                %order_id,
                current_status = %payment.status,
                "payment_webhook: payment already settled; ignoring duplicate"
            );
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        let outcome = match disposition {
            IpnDisposition::Succeeded => self.complete(&payment, now).await?,
            IpnDisposition::Failed => self.fail(&payment, now).await?,
            IpnDisposition::InProgress => WebhookOutcome::Ignored,
        };

        info!(
            %order_id,
            user_id = %payment.user_id,
            %outcome,
            "payment_webhook: reconciled"
        );
        Ok(outcome)
    }

    async fn complete(
        &self,
        payment: &PaymentEntity,
        now: DateTime<Utc>,
    ) -> WebhookResult<WebhookOutcome> {
        let plan = Plan::from_str(&payment.plan)
            .filter(Plan::is_purchasable)
            .ok_or_else(|| {
                anyhow!("payment {} carries unknown plan {}", payment.id, payment.plan)
            })?;
        let period = SubscriptionPeriod::from_str(&payment.subscription_period).ok_or_else(|| {
            anyhow!(
                "payment {} carries unknown period {}",
                payment.id,
                payment.subscription_period
            )
        })?;

        let grant = SubscriptionGrant {
            user_id: payment.user_id,
            plan,
            period,
            renewal_policy: self.renewal_policy,
            granted_at: now,
        };

        let applied = self
            .payment_repo
            .complete_pending_with_subscription(payment.id, now, grant)
            .await
            .map_err(|err| {
                error!(
                    order_id = %payment.id,
                    user_id = %payment.user_id,
                    db_error = ?err,
                    "payment_webhook: failed to apply payment"
                );
                WebhookError::Internal(err)
            })?;

        let Some(subscription) = applied else {
            info!(order_id = %payment.id, "payment_webhook: lost race to a concurrent delivery");
            return Ok(WebhookOutcome::AlreadyProcessed);
        };

        info!(
            order_id = %payment.id,
            user_id = %payment.user_id,
            plan = %plan,
            expires_at = ?subscription.expires_at,
            renewal_policy = %self.renewal_policy,
            "payment_webhook: subscription activated"
        );
        Ok(WebhookOutcome::Completed)
    }

    async fn fail(
        &self,
        payment: &PaymentEntity,
        now: DateTime<Utc>,
    ) -> WebhookResult<WebhookOutcome> {
        let applied = self
            .payment_repo
            .fail_pending(payment.id, now)
            .await
            .map_err(|err| {
                error!(
                    order_id = %payment.id,
                    db_error = ?err,
                    "payment_webhook: failed to mark payment failed"
                );
                WebhookError::Internal(err)
            })?;

        Ok(if applied {
            WebhookOutcome::Failed
        } else {
            WebhookOutcome::AlreadyProcessed
        })
    }
}
