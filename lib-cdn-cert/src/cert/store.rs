use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use super::errors::DeployErrors;
use super::retry::RetryingCaller;
use super::types::{
    CertificateOrder, CertificateStatus, ListOrdersResponse, RemoteCallSpec, UploadResponse,
    CAS_API_VERSION,
};

const LIST_ACTION: &str = "ListUserCertificateOrder";
const DELETE_ACTION: &str = "DeleteUserCertificate";
const UPLOAD_ACTION: &str = "UploadUserCertificate";
const ORDER_TYPE_UPLOAD: &str = "UPLOAD";
const PAGE_SIZE: u64 = 50;

/// Uploaded certificates on the certificate service, addressed by name.
#[derive(Clone)]
pub struct CertificateStore {
    caller: RetryingCaller,
    endpoint: Url,
}

impl CertificateStore {
    pub fn new(caller: RetryingCaller, endpoint: Url) -> Self {
        CertificateStore { caller, endpoint }
    }

    fn spec(&self, action: &str) -> RemoteCallSpec {
        RemoteCallSpec::new(&self.endpoint, CAS_API_VERSION, action)
    }

    /// Lists uploaded certificates whose name matches `name` and whose status is `status`.
    ///
    /// Walks every result page; an empty result is not an error.
    pub async fn list_by_status(
        &self,
        name: &str,
        status: &CertificateStatus,
    ) -> Result<Vec<CertificateOrder>, DeployErrors> {
        let mut orders = Vec::new();
        let mut page: u64 = 1;
        loop {
            let spec = self
                .spec(LIST_ACTION)
                .param("OrderType", ORDER_TYPE_UPLOAD)
                .param("Status", status.to_string())
                .param("Keyword", name)
                .param("CurrentPage", page.to_string())
                .param("ShowSize", PAGE_SIZE.to_string());
            let response: ListOrdersResponse = decode(LIST_ACTION, self.caller.call(&spec).await?)?;
            let received = response.certificate_order_list.len();
            orders.extend(response.certificate_order_list);
            // Without a total, a short page is the last one.
            let done = match response.total_count {
                Some(total) => orders.len() as u64 >= total,
                None => (received as u64) < PAGE_SIZE,
            };
            if received == 0 || done {
                break;
            }
            page += 1;
        }
        tracing::debug!(
            "{} certificate(s) named like {:?} with status {}",
            orders.len(),
            name,
            status
        );
        Ok(orders)
    }

    /// Deletes every uploaded certificate named like `name` that is about to
    /// expire or already expired, one at a time.
    ///
    /// Near-expiry certificates are deleted before expired ones. The first
    /// failed delete stops the sweep.
    ///
    /// # Returns
    /// The ids of the deleted certificates, in deletion order.
    pub async fn delete_expired(&self, name: &str) -> Result<Vec<u64>, DeployErrors> {
        let expired = self.list_by_status(name, &CertificateStatus::Expired).await?;
        let will_expire = self
            .list_by_status(name, &CertificateStatus::WillExpire)
            .await?;

        let mut deleted = Vec::new();
        for order in will_expire.iter().chain(expired.iter()) {
            tracing::info!(
                "Found previously deployed certificate {}. Deleting.",
                order.certificate_id
            );
            self.delete(order.certificate_id).await?;
            deleted.push(order.certificate_id);
        }
        Ok(deleted)
    }

    pub async fn delete(&self, cert_id: u64) -> Result<(), DeployErrors> {
        let spec = self.spec(DELETE_ACTION).param("CertId", cert_id.to_string());
        self.caller.call(&spec).await?;
        Ok(())
    }

    /// Uploads the certificate chain and key under `name`.
    ///
    /// Does not look for an existing certificate with the same name; clearing
    /// those out is `delete_expired`'s job.
    ///
    /// # Returns
    /// The id the service assigned, when it reports one.
    pub async fn upload(
        &self,
        name: &str,
        fullchain_pem: &str,
        key_pem: &str,
    ) -> Result<Option<u64>, DeployErrors> {
        let spec = self
            .spec(UPLOAD_ACTION)
            .param("Cert", fullchain_pem)
            .param("Key", key_pem)
            .param("Name", name);
        let response: UploadResponse = decode(UPLOAD_ACTION, self.caller.call(&spec).await?)?;
        Ok(response.cert_id)
    }
}

fn decode<T: DeserializeOwned>(action: &str, value: Value) -> Result<T, DeployErrors> {
    serde_json::from_value(value).map_err(|source| DeployErrors::UnexpectedResponse {
        action: action.to_string(),
        source,
    })
}
