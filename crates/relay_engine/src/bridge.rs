use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn, short_id};
use relay_core::{QueueItem, TabId};

use crate::agent::AutomationAgent;
use crate::pacing::handshake_grace;
use crate::store::Storage;
use crate::{AutomationRequest, BridgeError, BridgeFailure};

#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// Destination URL pattern; `*` matches any run of characters.
    pub target_pattern: String,
    pub exchange_timeout: Duration,
    pub handshake_grace: Duration,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            target_pattern: "https://chatgpt.com/*".to_string(),
            exchange_timeout: Duration::from_secs(5 * 60),
            handshake_grace: Duration::from_secs(1),
        }
    }
}

/// Finds the destination tab, makes sure an agent answers in it, and runs
/// one request/response exchange per item attempt.
pub struct AutomationBridge {
    agent: Arc<dyn AutomationAgent>,
    storage: Arc<dyn Storage>,
    settings: BridgeSettings,
}

impl AutomationBridge {
    pub fn new(
        agent: Arc<dyn AutomationAgent>,
        storage: Arc<dyn Storage>,
        settings: BridgeSettings,
    ) -> Self {
        Self {
            agent,
            storage,
            settings,
        }
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    /// Prefers `preferred` while it still points at a matching tab.
    pub async fn discover(&self, preferred: Option<&TabId>) -> Result<TabId, BridgeError> {
        let tabs = self.agent.list_tabs().await.map_err(|err| {
            BridgeError::new(
                BridgeFailure::NoDestination,
                format!("could not list tabs: {err}"),
            )
        })?;
        let matching = tabs
            .into_iter()
            .filter(|tab| pattern_matches(&self.settings.target_pattern, &tab.url));

        let mut first = None;
        for tab in matching {
            if Some(&tab.id) == preferred {
                return Ok(tab.id);
            }
            if first.is_none() {
                first = Some(tab.id);
            }
        }
        match first {
            Some(tab) => {
                engine_info!("Discovered destination tab {}", tab);
                Ok(tab)
            }
            None => Err(BridgeError::new(
                BridgeFailure::NoDestination,
                format!("no open tab matches {}", self.settings.target_pattern),
            )),
        }
    }

    /// Probe, inject on failure, wait out the grace period, probe once more.
    pub async fn ensure_ready(&self, tab: &TabId) -> Result<(), BridgeError> {
        if self.agent.ping(tab).await.unwrap_or(false) {
            return Ok(());
        }
        engine_debug!("Agent in tab {} did not answer, injecting", tab);
        if let Err(err) = self.agent.inject(tab).await {
            engine_warn!("Injecting agent into tab {} failed: {}", tab, err);
        }
        handshake_grace(self.settings.handshake_grace).await;
        match self.agent.ping(tab).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(BridgeError::new(
                BridgeFailure::NotReady,
                "automation agent did not answer after injection",
            )),
            Err(err) => Err(BridgeError::new(BridgeFailure::NotReady, err.to_string())),
        }
    }

    /// Discovery plus handshake, for the readiness probe command.
    pub async fn probe(&self, preferred: Option<&TabId>) -> Result<TabId, BridgeError> {
        let tab = self.discover(preferred).await?;
        self.ensure_ready(&tab).await?;
        Ok(tab)
    }

    /// Handshake, then the exchange for `item` with `tool` already resolved.
    pub async fn run_item(
        &self,
        tab: &TabId,
        item: &QueueItem,
        tool: Option<String>,
    ) -> Result<Option<serde_json::Value>, BridgeError> {
        self.ensure_ready(tab).await?;

        let image_ref = self.stage_images(item)?;
        let request = AutomationRequest {
            prompt: item.effective_prompt().to_string(),
            tool,
            mode: item.mode.clone(),
            image_ref: image_ref.clone(),
        };
        let outcome = self.exchange(tab, &request).await;

        if let Some(key) = image_ref {
            if let Err(err) = self.storage.remove(&key) {
                engine_warn!("Failed to clear image slot {}: {}", key, err);
            }
        }
        outcome
    }

    async fn exchange(
        &self,
        tab: &TabId,
        request: &AutomationRequest,
    ) -> Result<Option<serde_json::Value>, BridgeError> {
        let timeout = self.settings.exchange_timeout;
        let response = match tokio::time::timeout(timeout, self.agent.send(tab, request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                return Err(BridgeError::new(BridgeFailure::Transport, err.to_string()))
            }
            Err(_) => {
                return Err(BridgeError::new(
                    BridgeFailure::Timeout,
                    format!("automation request timed out after {}s", timeout.as_secs()),
                ))
            }
        };

        if response.success {
            Ok(response.data)
        } else {
            Err(BridgeError::new(
                BridgeFailure::Rejected,
                response
                    .error
                    .unwrap_or_else(|| "automation agent reported failure".to_string()),
            ))
        }
    }

    fn stage_images(&self, item: &QueueItem) -> Result<Option<String>, BridgeError> {
        if item.images.is_empty() {
            return Ok(None);
        }
        let key = image_slot_key(item);
        let payload = serde_json::to_value(&item.images).map_err(|err| {
            BridgeError::new(BridgeFailure::Transport, format!("encoding images: {err}"))
        })?;
        self.storage.put(&key, payload).map_err(|err| {
            BridgeError::new(BridgeFailure::Transport, format!("staging images: {err}"))
        })?;
        engine_debug!(
            "Staged {} image(s) for item {}",
            item.images.len(),
            short_id(item.id.as_str())
        );
        Ok(Some(key))
    }
}

/// Storage slot holding an item's images for the duration of one exchange.
pub fn image_slot_key(item: &QueueItem) -> String {
    format!("queue_images_{}", item.id)
}

/// Glob match where `*` spans any run of characters.
pub fn pattern_matches(pattern: &str, url: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(head) = parts.next() else {
        return true;
    };
    let Some(mut rest) = url.strip_prefix(head) else {
        return false;
    };
    let segments: Vec<&str> = parts.collect();
    let Some((last, middle)) = segments.split_last() else {
        // No wildcard at all: exact match.
        return rest.is_empty();
    };
    for segment in middle {
        match rest.find(segment) {
            Some(pos) => rest = &rest[pos + segment.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}
