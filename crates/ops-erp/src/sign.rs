//! OAuth-1.0a request signing (HMAC-SHA256 variant).
//!
//! Signing is a pure function of (method, base URL, parameter set, nonce,
//! timestamp): the client supplies a fresh nonce and the wall clock, tests
//! supply fixed ones and assert the exact header. The signed parameter set
//! covers both the oauth_* parameters and the endpoint's script/deploy
//! query parameters.

use base64::Engine;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// RFC 3986 unreserved characters stay bare; everything else is encoded.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn enc(s: &str) -> String {
    utf8_percent_encode(s, OAUTH_ENCODE_SET).to_string()
}

/// Three-legged token credential set.
#[derive(Debug, Clone)]
pub struct OauthCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token_id: String,
    pub token_secret: String,
    /// Account realm carried in the Authorization header.
    pub realm: String,
}

/// The canonical signature base string: METHOD & enc(url) & enc(params),
/// with parameters percent-encoded pairwise, sorted, and joined with '&'.
pub fn signature_base_string(method: &str, base_url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (enc(k), enc(v)))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        enc(base_url),
        enc(&param_string)
    )
}

fn hmac_signature(creds: &OauthCredentials, base: &str) -> String {
    let key = format!("{}&{}", enc(&creds.consumer_secret), enc(&creds.token_secret));
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("hmac accepts any key length");
    mac.update(base.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Build the full `Authorization: OAuth ...` header value.
///
/// `extra_params` are the endpoint query parameters (script, deploy); they
/// participate in the signature but are not emitted into the header.
pub fn authorization_header(
    creds: &OauthCredentials,
    method: &str,
    base_url: &str,
    extra_params: &[(String, String)],
    nonce: &str,
    timestamp: i64,
) -> String {
    let ts = timestamp.to_string();
    let oauth_params: Vec<(String, String)> = vec![
        ("oauth_consumer_key".to_string(), creds.consumer_key.clone()),
        ("oauth_nonce".to_string(), nonce.to_string()),
        ("oauth_signature_method".to_string(), "HMAC-SHA256".to_string()),
        ("oauth_timestamp".to_string(), ts.clone()),
        ("oauth_token".to_string(), creds.token_id.clone()),
        ("oauth_version".to_string(), "1.0".to_string()),
    ];

    let mut all_params = oauth_params.clone();
    all_params.extend_from_slice(extra_params);

    let base = signature_base_string(method, base_url, &all_params);
    let sig = hmac_signature(creds, &base);

    let mut header = format!("OAuth realm=\"{}\"", enc(&creds.realm));
    for (k, v) in &oauth_params {
        header.push_str(&format!(", {}=\"{}\"", k, enc(v)));
    }
    header.push_str(&format!(", oauth_signature=\"{}\"", enc(&sig)));
    header
}
