//! Request signing for the token endpoint
//!
//! The token request is authenticated with a signature over a canonical
//! string:
//!
//! ```text
//! METHOD&PATH&k1=v1&k2=v2&Content-Type:<type>&Date:<rfc1123 date>
//! ```
//!
//! Every parameter key and value, the content type and the date are
//! percent-encoded. The resulting `Authorization` header is
//! `BCS <client_id>:<signature>`.

use crate::{ClientError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Authorization scheme of the signed token request
pub const AUTH_SCHEME: &str = "BCS";

/// Content type of every form-encoded request body
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Produces the signature for a canonical request string
pub trait RequestSigner: Send + Sync {
    fn sign(&self, secret: &str, canonical: &str) -> Result<String>;
}

/// Base64-encoded HMAC-SHA1 signer
#[derive(Clone, Copy, Debug, Default)]
pub struct HmacSha1Signer;

impl RequestSigner for HmacSha1Signer {
    fn sign(&self, secret: &str, canonical: &str) -> Result<String> {
        let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
            .map_err(|e| ClientError::Signing(e.to_string()))?;
        mac.update(canonical.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

/// Format a timestamp as an RFC 1123 `Date` header value
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Build the canonical string that gets signed
pub fn canonical_string(
    method: &str,
    path: &str,
    params: &[(String, String)],
    content_type: &str,
    date: &str,
) -> String {
    let params = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}&{}:{}&{}:{}",
        method.to_ascii_uppercase(),
        path,
        params,
        urlencoding::encode("Content-Type"),
        urlencoding::encode(content_type),
        urlencoding::encode("Date"),
        urlencoding::encode(date),
    )
}

/// `Authorization` header value for a signed request
pub fn authorization_header(client_id: &str, signature: &str) -> String {
    format!("{} {}:{}", AUTH_SCHEME, client_id, signature)
}
