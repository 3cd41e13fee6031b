pub mod cert;

pub use cert::deployer::{CertificateDeployer, DeployState, DeploymentReport};
pub use cert::errors::{AliyunError, DeployErrors};
pub use cert::types::{parse_domains, Credentials, DeploymentConfig};
