use std::time::Duration;

use relay_core::TabId;
use serde::Deserialize;

use crate::agent::{AgentError, AutomationAgent};
use crate::{AutomationRequest, AutomationResponse, TabInfo};

#[derive(Debug, Clone)]
pub struct HttpAgentSettings {
    /// Base URL of the local automation host, e.g. `http://127.0.0.1:9222`.
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Short requests only; the item exchange is bounded by the bridge.
    pub control_timeout: Duration,
}

impl Default for HttpAgentSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:17321".to_string(),
            connect_timeout: Duration::from_secs(5),
            control_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PingReply {
    #[serde(default)]
    ready: bool,
}

/// Talks JSON over HTTP to a local automation host.
#[derive(Debug, Clone)]
pub struct HttpAutomationAgent {
    settings: HttpAgentSettings,
    client: reqwest::Client,
}

impl HttpAutomationAgent {
    pub fn new(settings: HttpAgentSettings) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| AgentError::Transport(err.to_string()))?;
        Ok(Self { settings, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    fn tab_url(&self, tab: &TabId, action: &str) -> String {
        self.url(&format!("/tabs/{}/{}", tab.0, action))
    }
}

#[async_trait::async_trait]
impl AutomationAgent for HttpAutomationAgent {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>, AgentError> {
        let response = self
            .client
            .get(self.url("/tabs"))
            .timeout(self.settings.control_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        decode(response).await
    }

    async fn ping(&self, tab: &TabId) -> Result<bool, AgentError> {
        let response = self
            .client
            .post(self.tab_url(tab, "ping"))
            .timeout(self.settings.control_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let reply: PingReply = decode(response).await?;
        Ok(reply.ready)
    }

    async fn inject(&self, tab: &TabId) -> Result<(), AgentError> {
        let response = self
            .client
            .post(self.tab_url(tab, "inject"))
            .timeout(self.settings.control_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(response).await.map(|_| ())
    }

    async fn send(
        &self,
        tab: &TabId,
        request: &AutomationRequest,
    ) -> Result<AutomationResponse, AgentError> {
        // No per-request timeout here: the bridge wraps the whole exchange.
        let response = self
            .client
            .post(self.tab_url(tab, "run"))
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        decode(response).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AgentError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AgentError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, AgentError> {
    let response = check_status(response).await?;
    response
        .json::<T>()
        .await
        .map_err(|err| AgentError::Decode(err.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> AgentError {
    if err.is_timeout() {
        return AgentError::Transport(format!("request timed out: {err}"));
    }
    AgentError::Transport(err.to_string())
}
