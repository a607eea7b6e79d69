mod config;
mod discord;
mod layer;
mod notifier;

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use config::ObservabilityConfig;
use discord::DiscordAlertSink;
use layer::AlertLayer;
use notifier::AlertDispatcher;

/// Installs the global subscriber: console logs filtered by `RUST_LOG` plus an
/// optional alert sink for high-severity events. Call from inside the runtime.
pub fn init_observability(service: &str) -> Result<()> {
    let config = ObservabilityConfig::from_env(service);
    let mut warnings = config.warnings.clone();

    let alert_layer = match &config.alerts {
        Some(alerts) => match DiscordAlertSink::new(alerts.webhook_url.clone()) {
            Ok(sink) => {
                let dispatcher = AlertDispatcher::spawn(vec![Arc::new(sink)]);
                Some(
                    AlertLayer::new(dispatcher, config.identity.clone(), alerts.min_level)
                        .with_filter(LevelFilter::from_level(alerts.min_level)),
                )
            }
            Err(err) => {
                warnings.push(format!("alert sink unavailable: {err}"));
                None
            }
        },
        None => None,
    };

    let alerts_enabled = alert_layer.is_some();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Local time, so `TZ` is reflected in the console output.
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    for warning in &warnings {
        warn!(
            service = %config.identity.service,
            stage = %config.identity.stage,
            warning = %warning,
            "observability: config warning"
        );
    }

    info!(
        service = %config.identity.service,
        stage = %config.identity.stage,
        alerts_enabled,
        "observability: initialized"
    );

    Ok(())
}
