pub mod checkout;
pub mod entitlements;
pub mod payment_webhook;
pub mod plans;
