use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Duration;

use super::errors::AliyunError;
use super::http_request::Transport;
use super::signature::SignedCall;

type Handler = Box<dyn Fn(&SignedCall, usize) -> Result<Value, AliyunError> + Send + Sync>;

/// In-memory transport: answers with `handler` and records every call it sees.
pub(crate) struct ScriptedTransport {
    handler: Handler,
    calls: Mutex<Vec<SignedCall>>,
    events: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    /// `handler` receives the call and its zero-based position among all calls.
    pub(crate) fn new(
        handler: impl Fn(&SignedCall, usize) -> Result<Value, AliyunError> + Send + Sync + 'static,
    ) -> Self {
        ScriptedTransport {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Answers every call successfully with a plausible body.
    pub(crate) fn ok() -> Self {
        Self::new(|call, _| Ok(default_response(call)))
    }

    pub(crate) fn calls(&self) -> Vec<SignedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn actions(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.action).collect()
    }

    /// `start <action>` / `end <action>` markers in the order they happened.
    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(&self, call: &SignedCall, _timeout: Duration) -> Result<Value, AliyunError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call.clone());
            calls.len() - 1
        };
        self.events
            .lock()
            .unwrap()
            .push(format!("start {}", call.action));
        tokio::task::yield_now().await;
        let result = (self.handler)(call, index);
        self.events.lock().unwrap().push(format!("end {}", call.action));
        result
    }
}

pub(crate) fn default_response(call: &SignedCall) -> Value {
    match call.action.as_str() {
        "ListUserCertificateOrder" => json!({
            "RequestId": "req",
            "CertificateOrderList": [],
            "TotalCount": 0,
        }),
        "UploadUserCertificate" => json!({ "RequestId": "req", "CertId": 1001 }),
        _ => json!({ "RequestId": "req" }),
    }
}

pub(crate) fn unavailable() -> AliyunError {
    AliyunError::Api {
        code: "ServiceUnavailable".to_string(),
        message: "try again later".to_string(),
        request_id: "req".to_string(),
    }
}
