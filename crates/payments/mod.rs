pub mod ipn_signature;
pub mod nowpayments_client;
