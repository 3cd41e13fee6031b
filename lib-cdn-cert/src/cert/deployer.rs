use std::path::Path;
use std::sync::Arc;

use super::cdn::CdnBinder;
use super::errors::DeployErrors;
use super::http_request::{HttpTransport, Transport};
use super::retry::RetryingCaller;
use super::store::CertificateStore;
use super::types::DeploymentConfig;

/// Where a deployment run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployState {
    /// Nothing done yet.
    Idle,
    /// Certificate material read; clearing old certificates and uploading the new one.
    CertUploading,
    /// Certificate uploaded; binding it to the CDN domains.
    CdnBinding,
    /// Everything applied.
    Done,
    /// A step failed. Nothing already applied is rolled back.
    Failed,
}

impl DeployState {
    pub fn name(&self) -> &'static str {
        match self {
            DeployState::Idle => "idle",
            DeployState::CertUploading => "cert_uploading",
            DeployState::CdnBinding => "cdn_binding",
            DeployState::Done => "done",
            DeployState::Failed => "failed",
        }
    }
}

/// What a finished run changed on the remote side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentReport {
    pub deleted_certificates: Vec<u64>,
    pub uploaded_cert_id: Option<u64>,
    pub bound_domains: Vec<String>,
}

struct CertificateMaterial {
    fullchain: String,
    key: String,
}

/// Runs one deployment pass: clear expired certificates, upload the new one,
/// then bind it to every configured CDN domain.
pub struct CertificateDeployer {
    config: DeploymentConfig,
    store: CertificateStore,
    cdn: CdnBinder,
    state: DeployState,
    material: Option<CertificateMaterial>,
    report: DeploymentReport,
}

impl CertificateDeployer {
    /// Constructs a new `CertificateDeployer`.
    ///
    /// # Parameters
    /// * `config` - Parsed input of this run.
    /// * `transport` - Carries every remote call; both services share it.
    pub fn new(config: DeploymentConfig, transport: Arc<dyn Transport>) -> Self {
        let caller = RetryingCaller::new(
            transport,
            config.credentials.clone(),
            config.timeout,
            config.retry,
        );
        CertificateDeployer {
            store: CertificateStore::new(caller.clone(), config.cas_endpoint.clone()),
            cdn: CdnBinder::new(caller, config.cdn_endpoint.clone()),
            config,
            state: DeployState::Idle,
            material: None,
            report: DeploymentReport::default(),
        }
    }

    /// Same as [`CertificateDeployer::new`] over plain HTTPS.
    pub fn with_http(config: DeploymentConfig) -> Self {
        Self::new(config, Arc::new(HttpTransport::default()))
    }

    pub fn state(&self) -> DeployState {
        self.state
    }

    /// Advances the deployment by one state.
    ///
    /// Any error moves the deployment to `Failed` and is handed back unchanged.
    pub async fn advance(&mut self) -> Result<DeployState, DeployErrors> {
        let next = match self.state {
            DeployState::Idle => self.step_read_material().await,
            DeployState::CertUploading => self.step_upload().await,
            DeployState::CdnBinding => self.step_bind().await,
            DeployState::Done | DeployState::Failed => {
                return Err(DeployErrors::InvalidState(format!(
                    "deployment already {}",
                    self.state.name()
                )))
            }
        };
        match next {
            Ok(next) => {
                self.transition(next);
                Ok(next)
            }
            Err(err) => {
                self.material = None;
                self.transition(DeployState::Failed);
                Err(err)
            }
        }
    }

    /// Advances until the deployment is done or the first error.
    pub async fn run(&mut self) -> Result<DeploymentReport, DeployErrors> {
        while self.advance().await? != DeployState::Done {}
        Ok(self.report.clone())
    }

    fn transition(&mut self, next: DeployState) {
        tracing::debug!("Deployment {} -> {}", self.state.name(), next.name());
        self.state = next;
    }

    async fn step_read_material(&mut self) -> Result<DeployState, DeployErrors> {
        let fullchain = read_file(&self.config.fullchain_file).await?;
        let key = read_file(&self.config.key_file).await?;
        self.material = Some(CertificateMaterial { fullchain, key });
        Ok(DeployState::CertUploading)
    }

    async fn step_upload(&mut self) -> Result<DeployState, DeployErrors> {
        let material = self.material.take().ok_or_else(|| {
            DeployErrors::InvalidState("certificate material was not loaded".to_string())
        })?;
        let name = self.config.certificate_name.as_str();

        self.report.deleted_certificates = self.store.delete_expired(name).await?;
        let cert_id = self
            .store
            .upload(name, &material.fullchain, &material.key)
            .await?;
        match cert_id {
            Some(id) => tracing::info!("Uploaded certificate {} as {}.", name, id),
            None => tracing::info!("Uploaded certificate {}.", name),
        }
        self.report.uploaded_cert_id = cert_id;

        if self.config.domains.is_empty() {
            tracing::info!("No CDN domains configured, skipping CDN deployment.");
            Ok(DeployState::Done)
        } else {
            Ok(DeployState::CdnBinding)
        }
    }

    async fn step_bind(&mut self) -> Result<DeployState, DeployErrors> {
        self.report.bound_domains = self
            .cdn
            .bind_all(&self.config.domains, &self.config.certificate_name)
            .await?;
        Ok(DeployState::Done)
    }
}

async fn read_file(path: &Path) -> Result<String, DeployErrors> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| DeployErrors::LocalIo {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cert::testing::{default_response, unavailable, ScriptedTransport};
    use crate::cert::types::{parse_domains, Credentials};
    use serde_json::json;
    use std::path::PathBuf;
    use std::time::Duration;
    use url::Url;

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("fullchain.pem"), "FULLCHAIN").unwrap();
            std::fs::write(dir.path().join("key.pem"), "PRIVATE KEY").unwrap();
            Fixture { dir }
        }

        fn path(&self, file: &str) -> PathBuf {
            self.dir.path().join(file)
        }

        fn config(&self, domains: &str) -> DeploymentConfig {
            DeploymentConfig {
                credentials: Credentials::new(Some("id".into()), Some("secret".into()), None),
                fullchain_file: self.path("fullchain.pem"),
                key_file: self.path("key.pem"),
                certificate_name: "example-cert".to_string(),
                domains: parse_domains(domains),
                timeout: Duration::from_secs(1),
                retry: 2,
                cas_endpoint: Url::parse("https://cas.aliyuncs.com").unwrap(),
                cdn_endpoint: Url::parse("https://cdn.aliyuncs.com").unwrap(),
            }
        }
    }

    #[tokio::test]
    async fn test_end_to_end_without_previous_certificates() {
        let fixture = Fixture::new();
        let transport = Arc::new(ScriptedTransport::ok());
        let mut deployer = CertificateDeployer::new(
            fixture.config("cdn1.example.com cdn2.example.com"),
            transport.clone(),
        );
        let report = deployer.run().await.unwrap();

        assert_eq!(deployer.state(), DeployState::Done);
        assert_eq!(
            transport.actions(),
            vec![
                "ListUserCertificateOrder",
                "ListUserCertificateOrder",
                "UploadUserCertificate",
                "SetCdnDomainSSLCertificate",
                "SetCdnDomainSSLCertificate",
            ]
        );
        let calls = transport.calls();
        assert_eq!(calls[2].params["Cert"], "FULLCHAIN");
        assert_eq!(calls[2].params["Key"], "PRIVATE KEY");
        assert_eq!(calls[3].params["DomainName"], "cdn1.example.com");
        assert_eq!(calls[4].params["DomainName"], "cdn2.example.com");
        assert_eq!(
            report,
            DeploymentReport {
                deleted_certificates: vec![],
                uploaded_cert_id: Some(1001),
                bound_domains: vec![
                    "cdn1.example.com".to_string(),
                    "cdn2.example.com".to_string()
                ],
            }
        );
    }

    #[tokio::test]
    async fn test_no_domains_skips_binding_but_uploads() {
        let fixture = Fixture::new();
        let transport = Arc::new(ScriptedTransport::ok());
        let mut deployer = CertificateDeployer::new(fixture.config("  "), transport.clone());
        deployer.run().await.unwrap();
        let actions = transport.actions();
        assert!(actions.contains(&"UploadUserCertificate".to_string()));
        assert!(!actions.contains(&"SetCdnDomainSSLCertificate".to_string()));
        assert_eq!(deployer.state(), DeployState::Done);
    }

    #[tokio::test]
    async fn test_states_are_visited_in_order() {
        let fixture = Fixture::new();
        let transport = Arc::new(ScriptedTransport::ok());
        let mut deployer = CertificateDeployer::new(fixture.config("a.com"), transport);
        assert_eq!(deployer.state(), DeployState::Idle);
        assert_eq!(deployer.advance().await.unwrap(), DeployState::CertUploading);
        assert_eq!(deployer.advance().await.unwrap(), DeployState::CdnBinding);
        assert_eq!(deployer.advance().await.unwrap(), DeployState::Done);
        assert!(matches!(
            deployer.advance().await,
            Err(DeployErrors::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_failure_prevents_upload() {
        let fixture = Fixture::new();
        let transport = Arc::new(ScriptedTransport::new(|call, _| {
            match call.action.as_str() {
                "ListUserCertificateOrder" => Ok(json!({
                    "CertificateOrderList": [{ "CertificateId": 9, "Status": "EXPIRED" }],
                    "TotalCount": 1,
                })),
                "DeleteUserCertificate" => Err(unavailable()),
                _ => Ok(default_response(call)),
            }
        }));
        let mut deployer = CertificateDeployer::new(fixture.config("a.com"), transport.clone());
        let err = deployer.run().await.unwrap_err();

        assert!(matches!(err, DeployErrors::RemoteCall { .. }));
        assert_eq!(deployer.state(), DeployState::Failed);
        assert!(!transport
            .actions()
            .contains(&"UploadUserCertificate".to_string()));
    }

    #[tokio::test]
    async fn test_missing_key_file_fails_without_remote_calls() {
        let fixture = Fixture::new();
        let mut config = fixture.config("a.com");
        config.key_file = fixture.path("absent.pem");
        let transport = Arc::new(ScriptedTransport::ok());
        let mut deployer = CertificateDeployer::new(config, transport.clone());
        let err = deployer.run().await.unwrap_err();

        assert!(matches!(err, DeployErrors::LocalIo { ref path, .. } if path.ends_with("absent.pem")));
        assert_eq!(deployer.state(), DeployState::Failed);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_bind_failure_leaves_upload_in_place() {
        let fixture = Fixture::new();
        let transport = Arc::new(ScriptedTransport::new(|call, _| {
            if call.action == "SetCdnDomainSSLCertificate" {
                Err(unavailable())
            } else {
                Ok(default_response(call))
            }
        }));
        let mut deployer =
            CertificateDeployer::new(fixture.config("a.com b.com"), transport.clone());
        deployer.run().await.unwrap_err();

        assert_eq!(deployer.state(), DeployState::Failed);
        let actions = transport.actions();
        assert!(!actions.contains(&"DeleteUserCertificate".to_string()));
        assert_eq!(
            actions
                .iter()
                .filter(|a| a.as_str() == "SetCdnDomainSSLCertificate")
                .count(),
            2
        );
    }
}
