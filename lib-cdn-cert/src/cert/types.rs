use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const CAS_ENDPOINT: &str = "https://cas.aliyuncs.com";
pub const CAS_API_VERSION: &str = "2020-04-07";
pub const CDN_ENDPOINT: &str = "https://cdn.aliyuncs.com";
pub const CDN_API_VERSION: &str = "2018-05-10";

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_RETRY: u32 = 3;

/// Access credentials attached to every signed call.
///
/// Empty strings are normalized to `None` on construction, so an unset
/// environment variable and an empty one behave the same way.
#[derive(Clone, Default, PartialEq)]
pub struct Credentials {
    access_key_id: Option<String>,
    access_key_secret: Option<String>,
    security_token: Option<String>,
}

impl Credentials {
    pub fn new(
        access_key_id: Option<String>,
        access_key_secret: Option<String>,
        security_token: Option<String>,
    ) -> Self {
        Credentials {
            access_key_id: non_empty(access_key_id),
            access_key_secret: non_empty(access_key_secret),
            security_token: non_empty(security_token),
        }
    }
    /// The access-key pair, only when both halves are present.
    pub fn access_key(&self) -> Option<(&str, &str)> {
        match (&self.access_key_id, &self.access_key_secret) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }
    pub fn security_token(&self) -> Option<&str> {
        self.security_token.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field(
                "access_key_secret",
                &self.access_key_secret.as_ref().map(|_| "<redacted>"),
            )
            .field(
                "security_token",
                &self.security_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

const SENSITIVE_PARAMS: [&str; 3] = ["Key", "SecurityToken", "Signature"];

/// Call parameters as they may be printed: private key, token and signature masked.
pub(crate) fn redacted_params(params: &BTreeMap<String, String>) -> BTreeMap<&str, &str> {
    params
        .iter()
        .map(|(k, v)| {
            if SENSITIVE_PARAMS.contains(&k.as_str()) {
                (k.as_str(), "<redacted>")
            } else {
                (k.as_str(), v.as_str())
            }
        })
        .collect()
}

/// Everything needed to issue one outbound RPC call.
#[derive(Clone, PartialEq)]
pub struct RemoteCallSpec {
    pub endpoint: Url,
    pub api_version: String,
    pub action: String,
    pub params: BTreeMap<String, String>,
}

impl RemoteCallSpec {
    pub fn new(endpoint: &Url, api_version: &str, action: &str) -> Self {
        RemoteCallSpec {
            endpoint: endpoint.clone(),
            api_version: api_version.to_string(),
            action: action.to_string(),
            params: BTreeMap::new(),
        }
    }
    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

impl fmt::Debug for RemoteCallSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCallSpec")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_version", &self.api_version)
            .field("action", &self.action)
            .field("params", &redacted_params(&self.params))
            .finish()
    }
}

/// Lifecycle status of an uploaded certificate as reported by the certificate service.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum CertificateStatus {
    Issued,
    WillExpire,
    Expired,
    Other(String), // Anything the service adds later
}

impl From<&str> for CertificateStatus {
    fn from(status: &str) -> Self {
        match status {
            "ISSUED" => CertificateStatus::Issued,
            "WILLEXPIRED" => CertificateStatus::WillExpire,
            "EXPIRED" => CertificateStatus::Expired,
            other => CertificateStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for CertificateStatus {
    fn from(status: String) -> Self {
        CertificateStatus::from(status.as_str())
    }
}

impl Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateStatus::Issued => write!(f, "ISSUED"),
            CertificateStatus::WillExpire => write!(f, "WILLEXPIRED"),
            CertificateStatus::Expired => write!(f, "EXPIRED"),
            CertificateStatus::Other(status) => write!(f, "{status}"),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CertificateOrder {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub certificate_id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default = "unknown_status", deserialize_with = "status_from_str")]
    pub status: CertificateStatus,
}

fn unknown_status() -> CertificateStatus {
    CertificateStatus::Other(String::new())
}

fn status_from_str<'de, D>(deserializer: D) -> Result<CertificateStatus, D::Error>
where
    D: serde::Deserializer<'de>,
{
    String::deserialize(deserializer).map(CertificateStatus::from)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ListOrdersResponse {
    #[serde(default)]
    pub(crate) certificate_order_list: Vec<CertificateOrder>,
    #[serde(default)]
    pub(crate) total_count: Option<u64>,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(rename = "CertId")]
    pub(crate) cert_id: Option<u64>,
}

/// The fully parsed input of one deployment run.
#[derive(Debug, Clone)]
pub struct DeploymentConfig {
    pub credentials: Credentials,
    pub fullchain_file: PathBuf,
    pub key_file: PathBuf,
    pub certificate_name: String,
    pub domains: Vec<String>,
    pub timeout: Duration,
    pub retry: u32,
    pub cas_endpoint: Url,
    pub cdn_endpoint: Url,
}

/// Splits a whitespace-separated domain list, dropping blanks and duplicates.
/// The first occurrence of each domain decides its position.
pub fn parse_domains(raw: &str) -> Vec<String> {
    let mut domains: Vec<String> = Vec::new();
    for domain in raw.split_whitespace() {
        if !domains.iter().any(|d| d == domain) {
            domains.push(domain.to_string());
        }
    }
    domains
}
