//! Agent submission port - the HTTP surface of a party's cloud agent

use std::fmt::{self, Display};

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::domain::error::IssuanceError;

/// Status codes the flow expects from agents
pub mod status {
    pub const OK: u16 = 200;
    pub const CREATED: u16 = 201;
    pub const BAD_REQUEST: u16 = 400;
    pub const NOT_FOUND: u16 = 404;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST"
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status and decoded body of an agent response
#[derive(Debug, Clone, PartialEq)]
pub struct AgentResponse {
    pub status: u16,
    pub body:   serde_json::Value
}

impl AgentResponse {
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self { status, body }
    }

    /// Decode the body into a typed record
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, IssuanceError> {
        serde_json::from_value(self.body.clone()).map_err(IssuanceError::from)
    }
}

/// Port for submitting requests to an actor's agent
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Submit a request; any received status is a successful submission at this layer
    async fn submit(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>
    ) -> Result<AgentResponse, IssuanceError>;

    /// Absolute location of `path` on this agent
    fn resolve(&self, path: &str) -> String;

    /// Location of `path` as the agent itself reaches it, for URLs the agent dereferences
    fn resolve_internal(&self, path: &str) -> String {
        self.resolve(path)
    }
}
