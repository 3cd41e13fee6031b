use base64::prelude::{Engine, BASE64_STANDARD};
use chrono::{DateTime, Utc};
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::sign::Signer;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

use super::errors::AliyunError;
use super::types::{redacted_params, Credentials, RemoteCallSpec};

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const SIGNATURE_VERSION: &str = "1.0";
const HTTP_METHOD: &str = "POST";

// RFC 3986 unreserved characters stay as they are, everything else is escaped.
const RFC3986: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// A call ready to go on the wire: the call's own parameters merged with the
/// common parameters and, when credentials allow it, the signature.
#[derive(Clone, PartialEq)]
pub struct SignedCall {
    pub url: Url,
    pub action: String,
    pub params: BTreeMap<String, String>,
}

impl SignedCall {
    /// Form-encoded request body.
    pub fn body(&self) -> String {
        canonicalize(&self.params)
    }
}

impl fmt::Debug for SignedCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedCall")
            .field("url", &self.url.as_str())
            .field("action", &self.action)
            .field("params", &redacted_params(&self.params))
            .finish()
    }
}

pub(crate) fn percent_encode(value: &str) -> String {
    utf8_percent_encode(value, RFC3986).to_string()
}

pub(crate) fn canonicalize(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

pub(crate) fn string_to_sign(method: &str, canonicalized: &str) -> String {
    format!(
        "{method}&{}&{}",
        percent_encode("/"),
        percent_encode(canonicalized)
    )
}

pub(crate) fn hmac_sha1(secret: &str, string_to_sign: &str) -> Result<String, AliyunError> {
    let key = PKey::hmac(format!("{secret}&").as_bytes())?;
    let mut signer = Signer::new(MessageDigest::sha1(), &key)?;
    signer.update(string_to_sign.as_bytes())?;
    Ok(BASE64_STANDARD.encode(signer.sign_to_vec()?))
}

/// Signs `spec` with a fresh nonce and the current time.
pub fn sign_call(spec: &RemoteCallSpec, credentials: &Credentials) -> Result<SignedCall, AliyunError> {
    sign_call_at(
        spec,
        credentials,
        &uuid::Uuid::new_v4().to_string(),
        Utc::now(),
    )
}

pub(crate) fn sign_call_at(
    spec: &RemoteCallSpec,
    credentials: &Credentials,
    nonce: &str,
    now: DateTime<Utc>,
) -> Result<SignedCall, AliyunError> {
    let mut params = BTreeMap::new();
    params.insert("Action".to_string(), spec.action.clone());
    params.insert("Format".to_string(), "JSON".to_string());
    params.insert("Version".to_string(), spec.api_version.clone());
    params.insert("SignatureMethod".to_string(), SIGNATURE_METHOD.to_string());
    params.insert("SignatureVersion".to_string(), SIGNATURE_VERSION.to_string());
    params.insert("SignatureNonce".to_string(), nonce.to_string());
    params.insert(
        "Timestamp".to_string(),
        now.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    );
    if let Some(token) = credentials.security_token() {
        params.insert("SecurityToken".to_string(), token.to_string());
    }
    // Call parameters win over the common ones on a name clash.
    for (k, v) in &spec.params {
        params.insert(k.clone(), v.clone());
    }
    let access_key = credentials.access_key();
    if let Some((id, _)) = access_key {
        params.insert("AccessKeyId".to_string(), id.to_string());
    }
    if let Some((_, secret)) = access_key {
        let to_sign = string_to_sign(HTTP_METHOD, &canonicalize(&params));
        params.insert("Signature".to_string(), hmac_sha1(secret, &to_sign)?);
    }

    let mut url = spec.endpoint.clone();
    url.set_path("/");
    Ok(SignedCall {
        url,
        action: spec.action.clone(),
        params,
    })
}
