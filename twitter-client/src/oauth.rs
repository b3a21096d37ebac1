use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha1::Sha1;

use crate::TwitterCredentials;

type HmacSha1 = Hmac<Sha1>;

// RFC 5849 section 3.6: everything except the unreserved characters is
// percent encoded.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn percent_encode(input: &str) -> String {
    utf8_percent_encode(input, OAUTH_ENCODE_SET).to_string()
}

/// Authorization header for one signed request. `extra_params` carries any
/// query or form parameters; JSON bodies are not part of the signature.
pub(crate) fn authorization_header(
    credentials: &TwitterCredentials,
    method: &str,
    url: &str,
    extra_params: &[(&str, &str)],
) -> String {
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    build_header(credentials, method, url, extra_params, &nonce, timestamp)
}

fn build_header(
    credentials: &TwitterCredentials,
    method: &str,
    url: &str,
    extra_params: &[(&str, &str)],
    nonce: &str,
    timestamp: u64,
) -> String {
    let timestamp = timestamp.to_string();
    let oauth_params = [
        ("oauth_consumer_key", credentials.api_key.as_str()),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp.as_str()),
        ("oauth_token", credentials.access_token.as_str()),
        ("oauth_version", "1.0"),
    ];

    let signature = sign(credentials, method, url, extra_params, &oauth_params);

    let mut header_params: Vec<(&str, String)> = oauth_params
        .iter()
        .map(|(key, value)| (*key, percent_encode(value)))
        .collect();
    header_params.push(("oauth_signature", percent_encode(&signature)));
    header_params.sort();

    let rendered: Vec<String> = header_params
        .iter()
        .map(|(key, value)| format!("{}=\"{}\"", key, value))
        .collect();
    format!("OAuth {}", rendered.join(", "))
}

/// HMAC-SHA1 signature over the RFC 5849 base string: uppercase method,
/// encoded URL, and the sorted, individually encoded parameter pairs.
fn sign(
    credentials: &TwitterCredentials,
    method: &str,
    url: &str,
    extra_params: &[(&str, &str)],
    oauth_params: &[(&str, &str)],
) -> String {
    let mut pairs: Vec<(String, String)> = extra_params
        .iter()
        .chain(oauth_params.iter())
        .map(|(key, value)| (percent_encode(key), percent_encode(value)))
        .collect();
    pairs.sort();

    let param_string = pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    let base_string = format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(url),
        percent_encode(&param_string)
    );
    let signing_key = format!(
        "{}&{}",
        percent_encode(&credentials.api_secret_key),
        percent_encode(&credentials.access_token_secret)
    );

    let mut mac =
        HmacSha1::new_from_slice(signing_key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(base_string.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}
