use relay_core::TabId;
use thiserror::Error;

use crate::{AutomationRequest, AutomationResponse, TabInfo};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("connection to automation host failed: {0}")]
    Transport(String),
    #[error("automation host returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed reply from automation host: {0}")]
    Decode(String),
}

/// The remote automation collaborator: a host that can enumerate browser
/// tabs and drive the agent injected into one of them.
#[async_trait::async_trait]
pub trait AutomationAgent: Send + Sync {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>, AgentError>;

    /// Liveness probe; `Ok(false)` means the tab exists but nothing answered.
    async fn ping(&self, tab: &TabId) -> Result<bool, AgentError>;

    async fn inject(&self, tab: &TabId) -> Result<(), AgentError>;

    async fn send(
        &self,
        tab: &TabId,
        request: &AutomationRequest,
    ) -> Result<AutomationResponse, AgentError>;
}
