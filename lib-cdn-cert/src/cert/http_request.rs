use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::Value;
use std::time::Duration;

use super::errors::AliyunError;
use super::signature::SignedCall;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const SUCCESS_CODES: [&str; 4] = ["0", "200", "OK", "Success"];

/// Sends one signed call and returns the decoded JSON response.
///
/// This is the only place the remote services are touched, so swapping the
/// implementation is enough to run the whole deployment against a fake.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, call: &SignedCall, timeout: Duration) -> Result<Value, AliyunError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        HttpTransport { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, call: &SignedCall, timeout: Duration) -> Result<Value, AliyunError> {
        let response = self
            .client
            .post(call.url.clone())
            .header(header::CONTENT_TYPE, FORM_URLENCODED)
            .timeout(timeout)
            .body(call.body())
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        tracing::trace!("{} -> {}: {}", call.action, status, body);
        interpret_response(status.as_u16(), &body)
    }
}

pub(crate) fn interpret_response(status: u16, body: &str) -> Result<Value, AliyunError> {
    let json: Value = match serde_json::from_str(body) {
        Ok(json) => json,
        Err(_) if !(200..300).contains(&status) => {
            return Err(AliyunError::HttpStatus {
                status,
                body: body.to_string(),
            })
        }
        Err(e) => return Err(e.into()),
    };
    if let Some(code) = json.get("Code").and_then(code_as_string) {
        if !SUCCESS_CODES.contains(&code.as_str()) {
            return Err(AliyunError::Api {
                code,
                message: field(&json, "Message"),
                request_id: field(&json, "RequestId"),
            });
        }
    }
    if !(200..300).contains(&status) {
        return Err(AliyunError::HttpStatus {
            status,
            body: body.to_string(),
        });
    }
    Ok(json)
}

fn code_as_string(code: &Value) -> Option<String> {
    match code {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn field(json: &Value, name: &str) -> String {
    json[name].as_str().unwrap_or_default().to_string()
}
