use anyhow::{Context, Result, anyhow};
use std::str::FromStr;

use crates::{
    domain::value_objects::{pricing::PriceTable, renewal::RenewalPolicy},
    payments::nowpayments_client::DEFAULT_API_BASE,
};

use super::{
    config_model::{AuthSecret, BackendServer, Billing, Database, DotEnvyConfig, NowPayments},
    stage::Stage,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    load_from(|key| std::env::var(key).ok())
}

pub fn load_from<F>(lookup: F) -> Result<DotEnvyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let required = |key: &str| read(key).ok_or_else(|| anyhow!("{key} is invalid"));

    let stage = read("STAGE")
        .map(|raw| Stage::try_from(&raw))
        .transpose()?
        .unwrap_or_default();

    let backend_server = BackendServer {
        port: parse_or(&read, "SERVER_PORT_BACKEND", 8080)?,
        body_limit: parse_or(&read, "SERVER_BODY_LIMIT", 1)?,
        timeout: parse_or(&read, "SERVER_TIMEOUT", 15)?,
        public_base_url: required("PUBLIC_BASE_URL")?
            .trim_end_matches('/')
            .to_string(),
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: parse_or(&read, "DATABASE_MAX_CONNECTIONS", 10)?,
    };

    let auth = AuthSecret {
        jwt_secret: required("AUTH_JWT_SECRET")?,
    };

    let nowpayments = NowPayments {
        api_base: read("NOWPAYMENTS_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        api_key: read("NOWPAYMENTS_API_KEY"),
        ipn_secret: read("NOWPAYMENTS_IPN_SECRET"),
        timeout_secs: parse_or(&read, "NOWPAYMENTS_TIMEOUT_SECS", 10)?,
    };

    let discount_percent: u8 = parse_or(
        &read,
        "CHECKOUT_DISCOUNT_PERCENT",
        PriceTable::DEFAULT_DISCOUNT_PERCENT,
    )?;
    if discount_percent > 100 {
        return Err(anyhow!("CHECKOUT_DISCOUNT_PERCENT is invalid"));
    }

    let renewal_policy = match read("RENEWAL_POLICY") {
        Some(raw) => {
            RenewalPolicy::from_str(&raw).ok_or_else(|| anyhow!("RENEWAL_POLICY is invalid"))?
        }
        None => RenewalPolicy::default(),
    };

    Ok(DotEnvyConfig {
        stage,
        backend_server,
        database,
        auth,
        nowpayments,
        billing: Billing {
            discount_percent,
            renewal_policy,
        },
    })
}

fn parse_or<F, T>(read: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match read(key) {
        Some(raw) => raw.parse().with_context(|| format!("{key} is invalid")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_with(vars: &[(&str, &str)]) -> Result<DotEnvyConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        load_from(|key| vars.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DATABASE_URL", "postgres://localhost:5432/passgen"),
        ("AUTH_JWT_SECRET", "supersecretjwtsecretforunittesting123"),
        ("PUBLIC_BASE_URL", "https://passgen.example/"),
    ];

    #[test]
    fn defaults_apply_when_only_required_values_are_set() {
        let config = load_with(&REQUIRED).unwrap();

        assert_eq!(config.stage, Stage::Local);
        assert_eq!(config.backend_server.port, 8080);
        assert_eq!(config.backend_server.body_limit, 1);
        assert_eq!(config.backend_server.timeout, 15);
        assert_eq!(config.backend_server.public_base_url, "https://passgen.example");
        assert_eq!(config.nowpayments.api_base, DEFAULT_API_BASE);
        assert_eq!(config.nowpayments.api_key, None);
        assert_eq!(config.nowpayments.ipn_secret, None);
        assert_eq!(config.nowpayments.timeout_secs, 10);
        assert_eq!(config.billing.discount_percent, 5);
        assert_eq!(config.billing.renewal_policy, RenewalPolicy::ResetFromNow);
    }

    #[test]
    fn missing_required_value_is_named_in_the_error() {
        let err = load_with(&REQUIRED[..2]).unwrap_err();
        assert!(err.to_string().contains("PUBLIC_BASE_URL"));
    }

    #[test]
    fn blank_provider_secrets_count_as_unset() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("NOWPAYMENTS_API_KEY", "  "));
        vars.push(("NOWPAYMENTS_IPN_SECRET", "ipn"));

        let config = load_with(&vars).unwrap();
        assert_eq!(config.nowpayments.api_key, None);
        assert_eq!(config.nowpayments.ipn_secret.as_deref(), Some("ipn"));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("STAGE", "production"),
            ("SERVER_PORT_BACKEND", "9000"),
            ("CHECKOUT_DISCOUNT_PERCENT", "0"),
            ("RENEWAL_POLICY", "extend"),
        ]);

        let config = load_with(&vars).unwrap();
        assert_eq!(config.stage, Stage::Production);
        assert_eq!(config.backend_server.port, 9000);
        assert_eq!(config.billing.discount_percent, 0);
        assert_eq!(
            config.billing.renewal_policy,
            RenewalPolicy::ExtendFromCurrentExpiry
        );
    }

    #[test]
    fn malformed_values_are_rejected() {
        for (key, value) in [
            ("SERVER_PORT_BACKEND", "eighty"),
            ("CHECKOUT_DISCOUNT_PERCENT", "150"),
            ("RENEWAL_POLICY", "stack"),
            ("STAGE", "staging"),
        ] {
            let mut vars = REQUIRED.to_vec();
            vars.push((key, value));
            assert!(load_with(&vars).is_err(), "{key}={value} should be rejected");
        }
    }
}
