pub mod checkout;
pub mod me;
pub mod payment_webhook;
pub mod plans;

#[cfg(test)]
pub(crate) mod test_support;
