use hmac::{Hmac, Mac};
use serde_json::{Map, Number, Value};
use sha2::Sha512;
use thiserror::Error;

type HmacSha512 = Hmac<Sha512>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IpnSignatureError {
    #[error("ipn secret is not configured")]
    NotConfigured,
    #[error("ipn body is not a JSON object: {0}")]
    MalformedBody(String),
    #[error("ipn signature is not valid hex")]
    MalformedSignature,
    #[error("ipn signature mismatch")]
    Mismatch,
}

/// Verifies `x-nowpayments-sig` headers.
///
/// The provider signs the notification body after sorting its top-level keys:
/// `hex(HMAC-SHA512(ipn_secret, JSON.stringify(sorted_body)))`. Nested objects
/// keep the order they were sent in.
#[derive(Clone)]
pub struct IpnVerifier {
    secret: Option<String>,
}

impl std::fmt::Debug for IpnVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpnVerifier")
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl IpnVerifier {
    pub fn new(secret: Option<String>) -> Self {
        let secret = secret.filter(|value| !value.trim().is_empty());
        Self { secret }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Checks the signature and returns the parsed body. Nothing in the body
    /// should be trusted unless this returns `Ok`.
    pub fn verify(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<Map<String, Value>, IpnSignatureError> {
        let secret = self
            .secret
            .as_deref()
            .ok_or(IpnSignatureError::NotConfigured)?;

        let (body, canonical) = canonicalize(payload)?;
        let provided =
            hex::decode(signature.trim()).map_err(|_| IpnSignatureError::MalformedSignature)?;

        let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
            .map_err(|_| IpnSignatureError::NotConfigured)?;
        mac.update(canonical.as_bytes());
        mac.verify_slice(&provided)
            .map_err(|_| IpnSignatureError::Mismatch)?;

        Ok(body)
    }
}

/// Largest magnitude at which every integer is exactly representable as an f64.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Parses the body and re-serializes it with top-level keys in lexicographic order.
/// Floats without a fractional part are written as integers (`1.0` becomes `1`),
/// matching the provider's JavaScript serializer.
pub fn canonicalize(payload: &[u8]) -> Result<(Map<String, Value>, String), IpnSignatureError> {
    let parsed: Value = serde_json::from_slice(payload)
        .map_err(|err| IpnSignatureError::MalformedBody(err.to_string()))?;

    let Value::Object(object) = parsed else {
        return Err(IpnSignatureError::MalformedBody(
            "expected a top-level object".to_string(),
        ));
    };

    let mut entries: Vec<(String, Value)> = object
        .into_iter()
        .map(|(key, mut value)| {
            normalize_integral_floats(&mut value);
            (key, value)
        })
        .collect();
    entries.sort_by(|left, right| left.0.cmp(&right.0));
    let sorted: Map<String, Value> = entries.into_iter().collect();

    let canonical = serde_json::to_string(&sorted)
        .map_err(|err| IpnSignatureError::MalformedBody(err.to_string()))?;

    Ok((sorted, canonical))
}

fn normalize_integral_floats(value: &mut Value) {
    match value {
        Value::Number(number) => {
            if let Some(float) = number.as_f64().filter(|_| number.is_f64()) {
                if float.fract() == 0.0 && float.abs() <= MAX_SAFE_INTEGER {
                    *number = Number::from(float as i64);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(normalize_integral_floats),
        Value::Object(fields) => fields.values_mut().for_each(normalize_integral_floats),
        _ => {}
    }
}

/// Produces the signature the provider would send for `payload`.
pub fn sign(secret: &str, payload: &[u8]) -> Result<String, IpnSignatureError> {
    let (_, canonical) = canonicalize(payload)?;
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|_| IpnSignatureError::NotConfigured)?;
    mac.update(canonical.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
