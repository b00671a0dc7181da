//! Reqwest implementation of the agent port

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{Level, event};

use crate::{
    config::AgentSettings,
    domain::{constant::agent, error::IssuanceError},
    port::agent::{AgentClient, AgentResponse, Method}
};

/// Header carrying the agent API key
pub const API_KEY_HEADER: &str = "apikey";

/// Talks to a real cloud agent over HTTP
pub struct HttpAgent {
    client:        reqwest::Client,
    base_url:      String,
    api_key:       Option<String>,
    internal_host: Option<String>
}

impl HttpAgent {
    pub fn new(settings: &AgentSettings) -> Result<Self, IssuanceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.request_timeout_ms))
            .build()
            .map_err(|e| IssuanceError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            internal_host: settings.internal_host.clone()
        })
    }

    /// Decode a response body, keeping non-JSON text as a string value
    fn decode_body(text: &str) -> Value {
        if text.trim().is_empty() {
            return Value::Null;
        }
        serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
    }
}

#[async_trait]
impl AgentClient for HttpAgent {
    async fn submit(&self, method: Method, path: &str, body: Option<&Value>) -> Result<AgentResponse, IssuanceError> {
        let url = self.resolve(path);
        let mut builder = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url)
        };

        if let Some(api_key) = &self.api_key {
            builder = builder.header(API_KEY_HEADER, api_key);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        event!(Level::DEBUG, event = agent::REQUEST_SENT, method = %method, url = %url);

        let response = builder.send().await.map_err(|e| {
            event!(Level::WARN, event = agent::REQUEST_FAILED, method = %method, url = %url, error = %e);
            IssuanceError::Network(format!("{} request failed: {}", method, e))
        })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| IssuanceError::Network(format!("Failed to read response body: {}", e)))?;

        Ok(AgentResponse::new(status, Self::decode_body(&text)))
    }

    fn resolve(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn resolve_internal(&self, path: &str) -> String {
        let url = self.resolve(path);
        match &self.internal_host {
            Some(host) => url.replacen("://localhost", &format!("://{}", host), 1),
            None => url
        }
    }
}
