use std::env;

use tracing::Level;
use url::Url;

const DEFAULT_ALERT_LEVEL: Level = Level::ERROR;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServiceIdentity {
    pub(crate) service: String,
    pub(crate) stage: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AlertSinkConfig {
    pub(crate) webhook_url: Url,
    pub(crate) min_level: Level,
}

#[derive(Debug, Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) identity: ServiceIdentity,
    pub(crate) alerts: Option<AlertSinkConfig>,
    /// Reported once the subscriber is installed.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(service: &str) -> Self {
        Self::from_lookup(service, |key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(service: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let identity = ServiceIdentity {
            service: read("SERVICE_NAME").unwrap_or_else(|| service.trim().to_string()),
            stage: read("STAGE").unwrap_or_else(|| "local".to_string()),
        };

        let mut warnings = Vec::new();
        let alerts = alert_sink(&read, &mut warnings);

        Self {
            identity,
            alerts,
            warnings,
        }
    }
}

fn alert_sink<F>(read: &F, warnings: &mut Vec<String>) -> Option<AlertSinkConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let enabled = match read("ALERT_NOTIFY_ENABLED") {
        None => true,
        Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
            warnings.push(format!(
                "ALERT_NOTIFY_ENABLED is not a boolean (value: {raw}); treating as enabled"
            ));
            true
        }),
    };
    if !enabled {
        return None;
    }

    let raw_url = read("ALERT_WEBHOOK_URL")?;
    let webhook_url = match Url::parse(&raw_url) {
        Ok(url) => url,
        Err(err) => {
            // The URL embeds a token, so only the parse error is reported.
            warnings.push(format!(
                "ALERT_WEBHOOK_URL is invalid; alerts disabled (parse error: {err})"
            ));
            return None;
        }
    };

    let min_level = match read("ALERT_NOTIFY_LEVEL") {
        None => DEFAULT_ALERT_LEVEL,
        Some(raw) => parse_level(&raw).unwrap_or_else(|| {
            warnings.push(format!(
                "ALERT_NOTIFY_LEVEL is invalid (value: {raw}); defaulting to ERROR"
            ));
            DEFAULT_ALERT_LEVEL
        }),
    };

    Some(AlertSinkConfig {
        webhook_url,
        min_level,
    })
}

pub(crate) fn parse_level(input: &str) -> Option<Level> {
    match input.trim().to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
