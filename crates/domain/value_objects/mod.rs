pub mod entitlements;
pub mod enums;
pub mod payment_webhook;
pub mod payments;
pub mod pricing;
pub mod renewal;
