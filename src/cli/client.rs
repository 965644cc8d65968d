use std::time::Duration;

use anyhow::{anyhow, Context};
use reqwest::{Method, StatusCode};
use serde_json::Value;

/// Thin HTTP client for the router's health and root endpoints.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub async fn get(&self, path: &str) -> anyhow::Result<Value> {
        self.send(Method::GET, path).await
    }

    pub async fn post(&self, path: &str) -> anyhow::Result<Value> {
        self.send(Method::POST, path).await
    }

    async fn send(&self, method: Method, path: &str) -> anyhow::Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method, &url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .with_context(|| format!("{url} returned a non-JSON body ({status})"))?;

        unwrap_envelope(status, body)
    }
}

/// Pull `data` out of a success envelope, or turn an error envelope into an
/// `anyhow` error carrying the server's message and code.
pub fn unwrap_envelope(status: StatusCode, body: Value) -> anyhow::Result<Value> {
    if body.get("error").and_then(Value::as_bool) == Some(true) {
        let message = body.get("message").and_then(Value::as_str).unwrap_or("request failed");
        let code = body.get("code").and_then(Value::as_str).unwrap_or("UNKNOWN");
        return Err(anyhow!("{message} ({code}, HTTP {})", status.as_u16()));
    }

    match body {
        Value::Object(mut envelope) if envelope.contains_key("data") => {
            Ok(envelope.remove("data").unwrap_or(Value::Null))
        }
        other if status.is_success() => Ok(other),
        _ => Err(anyhow!("request failed with HTTP {}", status.as_u16())),
    }
}
