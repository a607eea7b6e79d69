use std::sync::Arc;

use axum::{Extension, Router, body::Body, http::Request, response::Response};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use crate::auth::{AccessClaims, JwtVerifier};

pub(crate) const JWT_SECRET: &str = "supersecretjwtsecretforunittesting123";

pub(crate) fn bearer(user_id: Uuid) -> String {
    let claims = AccessClaims {
        sub: user_id.to_string(),
        email: Some("dev@passgen.example".to_string()),
        exp: 9999999999,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap();
    format!("Bearer {token}")
}

pub(crate) fn with_auth(router: Router) -> Router {
    router.layer(Extension(Arc::new(JwtVerifier::new(JWT_SECRET))))
}

pub(crate) async fn send(router: Router, request: Request<Body>) -> (u16, Value) {
    let response: Response = router.oneshot(request).await.unwrap();
    let status = response.status().as_u16();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
