use std::fmt::Display;

use serde::Deserialize;
use serde_json::Value;

/// Status vocabulary of NOWPayments instant payment notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpnPaymentStatus {
    Waiting,
    Confirming,
    Confirmed,
    Sending,
    PartiallyPaid,
    Finished,
    Failed,
    Refunded,
    Expired,
    Other(String),
}

/// What a notification means for the local payment ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpnDisposition {
    Succeeded,
    Failed,
    InProgress,
}

impl IpnPaymentStatus {
    pub fn from_provider(value: &str) -> Self {
        match value {
            "waiting" => IpnPaymentStatus::Waiting,
            "confirming" => IpnPaymentStatus::Confirming,
            "confirmed" => IpnPaymentStatus::Confirmed,
            "sending" => IpnPaymentStatus::Sending,
            "partially_paid" => IpnPaymentStatus::PartiallyPaid,
            "finished" => IpnPaymentStatus::Finished,
            "failed" => IpnPaymentStatus::Failed,
            "refunded" => IpnPaymentStatus::Refunded,
            "expired" => IpnPaymentStatus::Expired,
            other => IpnPaymentStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            IpnPaymentStatus::Waiting => "waiting",
            IpnPaymentStatus::Confirming => "confirming",
            IpnPaymentStatus::Confirmed => "confirmed",
            IpnPaymentStatus::Sending => "sending",
            IpnPaymentStatus::PartiallyPaid => "partially_paid",
            IpnPaymentStatus::Finished => "finished",
            IpnPaymentStatus::Failed => "failed",
            IpnPaymentStatus::Refunded => "refunded",
            IpnPaymentStatus::Expired => "expired",
            IpnPaymentStatus::Other(raw) => raw.as_str(),
        }
    }

    pub fn disposition(&self) -> IpnDisposition {
        match self {
            IpnPaymentStatus::Finished | IpnPaymentStatus::Confirmed => IpnDisposition::Succeeded,
            IpnPaymentStatus::Failed | IpnPaymentStatus::Expired => IpnDisposition::Failed,
            _ => IpnDisposition::InProgress,
        }
    }
}

impl Display for IpnPaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The subset of an IPN body the reconciler reads. Everything else is only
/// relevant for signature verification.
#[derive(Debug, Clone, Deserialize)]
pub struct IpnNotification {
    pub order_id: String,
    pub payment_status: String,
    #[serde(default)]
    pub payment_id: Option<Value>,
    #[serde(default)]
    pub invoice_id: Option<Value>,
}

impl IpnNotification {
    pub fn status(&self) -> IpnPaymentStatus {
        IpnPaymentStatus::from_provider(&self.payment_status)
    }

    /// Provider ids arrive either as JSON numbers or strings.
    pub fn provider_payment_id(&self) -> Option<String> {
        self.payment_id.as_ref().and_then(value_to_id)
    }

    pub fn provider_invoice_id(&self) -> Option<String> {
        self.invoice_id.as_ref().and_then(value_to_id)
    }
}

pub fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) if !raw.is_empty() => Some(raw.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
