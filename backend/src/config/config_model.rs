use crates::domain::value_objects::renewal::RenewalPolicy;

use super::stage::Stage;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub stage: Stage,
    pub backend_server: BackendServer,
    pub database: Database,
    pub auth: AuthSecret,
    pub nowpayments: NowPayments,
    pub billing: Billing,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    /// MiB
    pub body_limit: u64,
    /// Seconds
    pub timeout: u64,
    pub public_base_url: String,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone)]
pub struct AuthSecret {
    pub jwt_secret: String,
}

impl std::fmt::Debug for AuthSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSecret").finish_non_exhaustive()
    }
}

/// Both keys are optional so the service can boot without them; checkout and
/// the webhook refuse to operate until they are set.
#[derive(Clone)]
pub struct NowPayments {
    pub api_base: String,
    pub api_key: Option<String>,
    pub ipn_secret: Option<String>,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for NowPayments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NowPayments")
            .field("api_base", &self.api_base)
            .field("api_key_set", &self.api_key.is_some())
            .field("ipn_secret_set", &self.ipn_secret.is_some())
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Billing {
    pub discount_percent: u8,
    pub renewal_policy: RenewalPolicy,
}
