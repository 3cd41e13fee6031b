use clap::Parser;
use lib_cdn_cert::cert::types::{
    CAS_ENDPOINT, CDN_ENDPOINT, DEFAULT_RETRY, DEFAULT_TIMEOUT_MS,
};
use lib_cdn_cert::{
    parse_domains, CertificateDeployer, Credentials, DeployErrors, DeploymentConfig,
    DeploymentReport,
};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct CliInput {
    #[arg(long, env)]
    pub access_key_id: Option<String>,
    #[arg(long, env, hide_env_values = true)]
    pub access_key_secret: Option<String>,
    #[arg(long, env, hide_env_values = true)]
    pub security_token: Option<String>,
    #[arg(short = 'f', long, env)]
    pub fullchain_file: PathBuf,
    #[arg(short = 'k', long, env)]
    pub key_file: PathBuf,
    #[arg(short = 'n', long, env)]
    pub certificate_name: String,
    /// Whitespace-separated list of CDN domains.
    #[arg(short = 'd', long, env, default_value = "")]
    pub cdn_domains: String,
    /// Per-call timeout in milliseconds.
    #[arg(short = 't', long, env, default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout: u64,
    /// Total attempts per remote call.
    #[arg(short = 'r', long, env, default_value_t = DEFAULT_RETRY)]
    pub retry: u32,
    #[arg(long, env, default_value = CAS_ENDPOINT)]
    pub cas_endpoint: String,
    #[arg(long, env, default_value = CDN_ENDPOINT)]
    pub cdn_endpoint: String,
}

impl CliInput {
    pub fn into_config(self) -> Result<DeploymentConfig, DeployErrors> {
        if self.certificate_name.trim().is_empty() {
            return Err(DeployErrors::Config(
                "certificate name must not be empty".to_string(),
            ));
        }
        // 0 means "not set", like an empty input.
        let timeout = match self.timeout {
            0 => DEFAULT_TIMEOUT_MS,
            ms => ms,
        };
        let retry = match self.retry {
            0 => DEFAULT_RETRY,
            n => n,
        };
        Ok(DeploymentConfig {
            credentials: Credentials::new(
                self.access_key_id,
                self.access_key_secret,
                self.security_token,
            ),
            fullchain_file: self.fullchain_file,
            key_file: self.key_file,
            certificate_name: self.certificate_name,
            domains: parse_domains(&self.cdn_domains),
            timeout: Duration::from_millis(timeout),
            retry,
            cas_endpoint: parse_endpoint("cas_endpoint", &self.cas_endpoint)?,
            cdn_endpoint: parse_endpoint("cdn_endpoint", &self.cdn_endpoint)?,
        })
    }
}

fn parse_endpoint(flag: &str, raw: &str) -> Result<Url, DeployErrors> {
    Url::parse(raw).map_err(|e| DeployErrors::Config(format!("invalid {flag} {raw:?}: {e}")))
}

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub async fn deploy(args: CliInput) -> Result<DeploymentReport, DeployErrors> {
    let config = args.into_config()?;
    tracing::debug!("Deploying with {:?}", config);
    CertificateDeployer::with_http(config).run().await
}

/// The error and all of its causes, outermost first.
pub fn error_chain(err: &dyn Error) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str(&format!("\n  caused by: {cause}"));
        source = cause.source();
    }
    chain
}

pub fn report_failure(err: &DeployErrors) {
    let chain = error_chain(err);
    tracing::error!("Deployment failed: {}", chain);
    if std::env::var("GITHUB_ACTIONS").is_ok_and(|v| v == "true") {
        // Workflow command; newlines have to be escaped to stay on one annotation.
        println!("::error::{}", chain.replace('%', "%25").replace('\n', "%0A"));
    }
}
