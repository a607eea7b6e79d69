use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    Extension, Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::{
    domain::value_objects::{entitlements::FeatureMatrix, pricing::PriceTable},
    infra::db::postgres::postgres_connection::PgPoolSquad,
    payments::{
        ipn_signature::IpnVerifier,
        nowpayments_client::{NowPaymentsClient, NowPaymentsConfig},
    },
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    auth::JwtVerifier,
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
};

/// Assembles every route with the shared layers. Split from `start` so the
/// full router can be built without binding a socket.
pub fn build_router(config: &DotEnvyConfig, db_pool: Arc<PgPoolSquad>) -> Result<Router> {
    let price_table = Arc::new(PriceTable::with_discount(config.billing.discount_percent)?);
    let features = Arc::new(FeatureMatrix::default());

    let invoice_client = Arc::new(NowPaymentsClient::new(NowPaymentsConfig {
        api_base: config.nowpayments.api_base.clone(),
        api_key: config.nowpayments.api_key.clone(),
        public_base_url: config.backend_server.public_base_url.clone(),
        timeout: Duration::from_secs(config.nowpayments.timeout_secs),
    })?);
    if !invoice_client.is_configured() {
        warn!("http: NOWPAYMENTS_API_KEY is not set; checkout will fail closed");
    }

    let ipn_verifier = Arc::new(IpnVerifier::new(config.nowpayments.ipn_secret.clone()));
    if !ipn_verifier.is_configured() {
        warn!("http: NOWPAYMENTS_IPN_SECRET is not set; payment webhooks will be rejected");
    }

    let jwt_verifier = Arc::new(JwtVerifier::new(&config.auth.jwt_secret));

    let app = Router::new()
        .merge(routers::checkout::routes(
            Arc::clone(&db_pool),
            invoice_client,
            Arc::clone(&price_table),
        ))
        .merge(routers::payment_webhook::routes(
            Arc::clone(&db_pool),
            ipn_verifier,
            config.billing.renewal_policy,
        ))
        .merge(routers::me::routes(Arc::clone(&db_pool), features))
        .merge(routers::plans::routes(price_table))
        .route("/api/health-check", get(default_routers::health_check))
        .fallback(default_routers::not_found)
        .layer(Extension(jwt_verifier))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    Ok(app)
}

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let app = build_router(&config, db_pool)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!(
        stage = %config.stage,
        port = config.backend_server.port,
        renewal_policy = %config.billing.renewal_policy,
        "http: server is running"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "http: failed to install ctrl+c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "http: failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("http: received ctrl+c signal"),
        _ = terminate => info!("http: received terminate signal"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config_loader::load_from;
    use axum::{body::Body, http::Request};
    use diesel::{
        PgConnection,
        r2d2::{ConnectionManager, Pool},
    };
    use std::collections::HashMap;
    use tower::ServiceExt;

    fn test_config() -> DotEnvyConfig {
        let vars = HashMap::from([
            ("DATABASE_URL", "postgres://localhost:1/passgen"),
            ("AUTH_JWT_SECRET", "supersecretjwtsecretforunittesting123"),
            ("PUBLIC_BASE_URL", "https://passgen.example"),
        ]);
        load_from(|key| vars.get(key).map(|value| value.to_string())).unwrap()
    }

    // Never connects: no idle connections are kept and these routes never check one out.
    fn lazy_pool() -> Arc<PgPoolSquad> {
        let manager = ConnectionManager::<PgConnection>::new("postgres://localhost:1/passgen");
        Arc::new(Pool::builder().min_idle(Some(0)).build_unchecked(manager))
    }

    #[tokio::test]
    async fn health_check_and_fallback_are_wired() {
        let app = build_router(&test_config(), lazy_pool()).unwrap();

        let health = app
            .clone()
            .oneshot(Request::builder().uri("/api/health-check").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status().as_u16(), 200);

        let missing = app
            .oneshot(Request::builder().uri("/api/v1/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status().as_u16(), 404);
    }

    #[tokio::test]
    async fn webhook_without_ipn_secret_fails_closed() {
        let app = build_router(&test_config(), lazy_pool()).unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/webhooks/nowpayments")
                    .header("x-nowpayments-sig", "00")
                    .body(Body::from(r#"{"order_id":"x","payment_status":"finished"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 500);
    }
}
