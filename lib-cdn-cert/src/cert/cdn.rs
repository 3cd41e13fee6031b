use url::Url;

use super::errors::DeployErrors;
use super::retry::RetryingCaller;
use super::types::{RemoteCallSpec, CDN_API_VERSION};

const BIND_ACTION: &str = "SetCdnDomainSSLCertificate";
const CERT_TYPE_CAS: &str = "cas";
const SSL_ON: &str = "on";

/// Points CDN domains at a certificate already uploaded to the certificate service.
#[derive(Clone)]
pub struct CdnBinder {
    caller: RetryingCaller,
    endpoint: Url,
}

impl CdnBinder {
    pub fn new(caller: RetryingCaller, endpoint: Url) -> Self {
        CdnBinder { caller, endpoint }
    }

    /// Binds `cert_name` to each domain in turn, with SSL forced on.
    ///
    /// Stops at the first domain that cannot be bound; the domains after it
    /// are left untouched.
    ///
    /// # Returns
    /// The domains that were bound, in order.
    pub async fn bind_all(
        &self,
        domains: &[String],
        cert_name: &str,
    ) -> Result<Vec<String>, DeployErrors> {
        let mut bound: Vec<String> = Vec::with_capacity(domains.len());
        for domain in domains.iter().map(|d| d.trim()).filter(|d| !d.is_empty()) {
            if bound.iter().any(|b| b == domain) {
                continue;
            }
            tracing::info!("Deploying certificate to CDN domain {}.", domain);
            self.bind(domain, cert_name).await?;
            bound.push(domain.to_string());
        }
        Ok(bound)
    }

    pub async fn bind(&self, domain: &str, cert_name: &str) -> Result<(), DeployErrors> {
        let spec = RemoteCallSpec::new(&self.endpoint, CDN_API_VERSION, BIND_ACTION)
            .param("DomainName", domain)
            .param("CertName", cert_name)
            .param("CertType", CERT_TYPE_CAS)
            .param("SSLProtocol", SSL_ON);
        self.caller.call(&spec).await?;
        Ok(())
    }
}
