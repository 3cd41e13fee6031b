use cdn_cert_deployer::{deploy, init_logging, report_failure, CliInput};
use clap::Parser;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let args = CliInput::parse();

    match deploy(args).await {
        Ok(report) => {
            tracing::info!(
                "Deployment finished: {} old certificate(s) deleted, {} CDN domain(s) updated.",
                report.deleted_certificates.len(),
                report.bound_domains.len()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            report_failure(&err);
            ExitCode::FAILURE
        }
    }
}
