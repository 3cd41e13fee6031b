use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::errors::{AliyunError, DeployErrors};
use super::http_request::Transport;
use super::signature::sign_call;
use super::types::{Credentials, RemoteCallSpec};

/// Issues remote calls with a bounded number of attempts.
///
/// Every failure counts against the budget the same way, whether it is a
/// network error, a rejected signature or a 5xx from the service.
#[derive(Clone)]
pub struct RetryingCaller {
    transport: Arc<dyn Transport>,
    credentials: Credentials,
    timeout: Duration,
    max_attempts: u32,
}

impl RetryingCaller {
    /// Constructs a new `RetryingCaller`.
    ///
    /// # Parameters
    /// * `transport` - Where signed calls are sent.
    /// * `credentials` - Attached to every call, only the parts that are present.
    /// * `timeout` - Per-attempt timeout.
    /// * `max_attempts` - Total attempts per call, including the first. Clamped to at least 1.
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Credentials,
        timeout: Duration,
        max_attempts: u32,
    ) -> Self {
        RetryingCaller {
            transport,
            credentials,
            timeout,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Calls `spec` until it succeeds or the attempt budget is spent.
    ///
    /// # Returns
    /// The decoded response body, or `DeployErrors::RemoteCall` carrying the last failure.
    pub async fn call(&self, spec: &RemoteCallSpec) -> Result<Value, DeployErrors> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(spec).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    tracing::warn!(
                        "Aliyun client error {}/{} on {}: {}",
                        attempt,
                        self.max_attempts,
                        spec.action,
                        err
                    );
                    if attempt >= self.max_attempts {
                        return Err(DeployErrors::RemoteCall {
                            action: spec.action.clone(),
                            attempts: attempt,
                            source: err,
                        });
                    }
                }
            }
        }
    }

    // Signed per attempt: the service refuses a nonce it has already seen.
    async fn attempt(&self, spec: &RemoteCallSpec) -> Result<Value, AliyunError> {
        let call = sign_call(spec, &self.credentials)?;
        tracing::trace!("POST {} Action={}", call.url, call.action);
        self.transport.post(&call, self.timeout).await
    }
}
