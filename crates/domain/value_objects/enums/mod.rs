pub mod payment_statuses;
pub mod plans;
pub mod subscription_periods;
pub mod subscription_statuses;
