use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::domain::value_objects::{payment_webhook::value_to_id, pricing::UsdAmount};

pub const DEFAULT_API_BASE: &str = "https://api.nowpayments.io/v1";
pub const IPN_CALLBACK_PATH: &str = "/api/webhooks/nowpayments";
const PRICE_CURRENCY: &str = "usd";

#[derive(Debug, Error)]
pub enum InvoiceGatewayError {
    #[error("nowpayments api key is not configured")]
    NotConfigured,
    #[error("nowpayments rejected the invoice request (status {status})")]
    Rejected { status: u16 },
    #[error("nowpayments returned an unusable invoice: {0}")]
    MalformedResponse(String),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct NowPaymentsConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub public_base_url: String,
    pub timeout: Duration,
}

/// Invoice parameters for one pending order.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceOrder {
    pub order_id: Uuid,
    pub amount: UsdAmount,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedInvoice {
    pub invoice_id: String,
    pub invoice_url: String,
}

#[derive(Debug, Serialize)]
struct CreateInvoiceBody<'a> {
    price_amount: UsdAmount,
    price_currency: &'a str,
    order_id: String,
    order_description: &'a str,
    ipn_callback_url: &'a str,
    success_url: &'a str,
    cancel_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct InvoiceResp {
    id: Option<Value>,
    invoice_url: Option<String>,
}

/// Minimal NOWPayments client built on reqwest.
pub struct NowPaymentsClient {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    ipn_callback_url: String,
    success_url: String,
    cancel_url: String,
}

impl NowPaymentsClient {
    pub fn new(config: NowPaymentsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build nowpayments http client")?;

        let public_base = config.public_base_url.trim_end_matches('/');

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.filter(|key| !key.trim().is_empty()),
            ipn_callback_url: format!("{public_base}{IPN_CALLBACK_PATH}"),
            success_url: format!("{public_base}/passgen/pricing?success=true"),
            cancel_url: format!("{public_base}/passgen/pricing?canceled=true"),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn invoice_body<'a>(&'a self, order: &'a InvoiceOrder) -> CreateInvoiceBody<'a> {
        CreateInvoiceBody {
            price_amount: order.amount,
            price_currency: PRICE_CURRENCY,
            order_id: order.order_id.to_string(),
            order_description: &order.description,
            ipn_callback_url: &self.ipn_callback_url,
            success_url: &self.success_url,
            cancel_url: &self.cancel_url,
        }
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response, InvoiceGatewayError> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let provider_message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_string));

        error!(
            status = %status,
            provider_message = ?provider_message,
            response_body = %body,
            context = %context,
            "nowpayments api request failed"
        );

        Err(InvoiceGatewayError::Rejected {
            status: status.as_u16(),
        })
    }

    /// Creates a hosted invoice for the order and returns its id and payment page.
    pub async fn create_invoice(
        &self,
        order: &InvoiceOrder,
    ) -> Result<CreatedInvoice, InvoiceGatewayError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(InvoiceGatewayError::NotConfigured)?;

        let resp = self
            .http
            .post(format!("{}/invoice", self.api_base))
            .header("x-api-key", api_key)
            .json(&self.invoice_body(order))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create invoice").await?;

        let parsed: InvoiceResp = resp.json().await?;
        parse_invoice(parsed)
    }
}

fn parse_invoice(resp: InvoiceResp) -> Result<CreatedInvoice, InvoiceGatewayError> {
    let invoice_id = resp
        .id
        .as_ref()
        .and_then(value_to_id)
        .ok_or_else(|| InvoiceGatewayError::MalformedResponse("missing invoice id".into()))?;
    let invoice_url = resp
        .invoice_url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| InvoiceGatewayError::MalformedResponse("missing invoice_url".into()))?;

    Ok(CreatedInvoice {
        invoice_id,
        invoice_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(api_key: Option<&str>) -> NowPaymentsClient {
        NowPaymentsClient::new(NowPaymentsConfig {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: api_key.map(str::to_string),
            public_base_url: "https://passgen.example/".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn invoice_body_carries_amount_order_and_callbacks() {
        let client = client(Some("key"));
        let order_id = Uuid::new_v4();
        let order = InvoiceOrder {
            order_id,
            amount: UsdAmount::from_cents(569),
            description: "PassGen PRO Plan (MONTH)".to_string(),
        };

        let body = serde_json::to_value(client.invoice_body(&order)).unwrap();

        assert_eq!(
            body,
            json!({
                "price_amount": 5.69,
                "price_currency": "usd",
                "order_id": order_id.to_string(),
                "order_description": "PassGen PRO Plan (MONTH)",
                "ipn_callback_url": "https://passgen.example/api/webhooks/nowpayments",
                "success_url": "https://passgen.example/passgen/pricing?success=true",
                "cancel_url": "https://passgen.example/passgen/pricing?canceled=true",
            })
        );
    }

    #[test]
    fn blank_api_key_counts_as_unconfigured() {
        assert!(client(Some("key")).is_configured());
        assert!(!client(Some("  ")).is_configured());
        assert!(!client(None).is_configured());
    }

    #[tokio::test]
    async fn create_invoice_without_key_fails_before_any_request() {
        let order = InvoiceOrder {
            order_id: Uuid::new_v4(),
            amount: UsdAmount::from_cents(569),
            description: "PassGen PRO Plan (MONTH)".to_string(),
        };

        let result = client(None).create_invoice(&order).await;
        assert!(matches!(result, Err(InvoiceGatewayError::NotConfigured)));
    }

    #[test]
    fn invoice_id_may_be_numeric_or_string() {
        let numeric: InvoiceResp = serde_json::from_value(json!({
            "id": 4522625843u64,
            "invoice_url": "https://nowpayments.io/payment/?iid=4522625843"
        }))
        .unwrap();
        assert_eq!(parse_invoice(numeric).unwrap().invoice_id, "4522625843");

        let text: InvoiceResp = serde_json::from_value(json!({
            "id": "inv_1",
            "invoice_url": "https://nowpayments.io/payment/?iid=inv_1"
        }))
        .unwrap();
        assert_eq!(parse_invoice(text).unwrap().invoice_id, "inv_1");
    }

    #[test]
    fn invoice_without_url_is_malformed() {
        let resp: InvoiceResp = serde_json::from_value(json!({ "id": 1 })).unwrap();
        assert!(matches!(
            parse_invoice(resp),
            Err(InvoiceGatewayError::MalformedResponse(_))
        ));
    }
}
