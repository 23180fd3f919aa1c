#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use relay_core::{
    ItemId, ItemStatus, ProcessState, ProcessStatePatch, QueueItem, Settings, SettingsPatch, TabId,
};
use relay_engine::{
    AgentError, AutomationAgent, AutomationRequest, AutomationResponse, Clock, EngineEvent,
    EventSink, MemoryStorage, Storage, StorageError, TabInfo,
};

pub const T0: i64 = 1_700_000_000_000;
pub const TARGET: &str = "https://chat.example.com/*";

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

/// Epoch clock that follows tokio's (pausable) virtual time.
pub struct TestClock {
    origin: tokio::time::Instant,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TestClock {
    fn now_ms(&self) -> i64 {
        T0 + self.origin.elapsed().as_millis() as i64
    }
}

#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl CollectingSink {
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub enum Reply {
    Respond(AutomationResponse),
    Error(AgentError),
    /// Sleeps before answering successfully.
    Slow(Duration),
}

type SendHook = Box<dyn Fn(&AutomationRequest) + Send + Sync>;

/// Automation agent double driven by a queue of canned replies.
pub struct ScriptedAgent {
    tabs: Mutex<Vec<TabInfo>>,
    ready: AtomicBool,
    ready_after_inject: AtomicBool,
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<AutomationRequest>>,
    pub injections: AtomicUsize,
    pub pings: AtomicUsize,
    on_send: Mutex<Option<SendHook>>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self {
            tabs: Mutex::new(vec![tab("tab-1", "https://chat.example.com/c/1")]),
            ready: AtomicBool::new(true),
            ready_after_inject: AtomicBool::new(true),
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            injections: AtomicUsize::new(0),
            pings: AtomicUsize::new(0),
            on_send: Mutex::new(None),
        }
    }

    pub fn with_tabs(self, tabs: Vec<TabInfo>) -> Self {
        *self.tabs.lock().unwrap() = tabs;
        self
    }

    pub fn not_ready(self, recovers_after_inject: bool) -> Self {
        self.ready.store(false, Ordering::SeqCst);
        self.ready_after_inject
            .store(recovers_after_inject, Ordering::SeqCst);
        self
    }

    pub fn reply(&self, reply: Reply) -> &Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn fail_with(&self, message: &str, times: usize) -> &Self {
        for _ in 0..times {
            self.reply(Reply::Respond(AutomationResponse::failed(message)));
        }
        self
    }

    pub fn on_send(&self, hook: impl Fn(&AutomationRequest) + Send + Sync + 'static) {
        *self.on_send.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn requests(&self) -> Vec<AutomationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|request| request.prompt)
            .collect()
    }
}

#[async_trait::async_trait]
impl AutomationAgent for ScriptedAgent {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>, AgentError> {
        Ok(self.tabs.lock().unwrap().clone())
    }

    async fn ping(&self, _tab: &TabId) -> Result<bool, AgentError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        Ok(self.ready.load(Ordering::SeqCst))
    }

    async fn inject(&self, _tab: &TabId) -> Result<(), AgentError> {
        self.injections.fetch_add(1, Ordering::SeqCst);
        if self.ready_after_inject.load(Ordering::SeqCst) {
            self.ready.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn send(
        &self,
        _tab: &TabId,
        request: &AutomationRequest,
    ) -> Result<AutomationResponse, AgentError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(hook) = self.on_send.lock().unwrap().as_ref() {
            hook(request);
        }
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            None => Ok(AutomationResponse::ok(serde_json::json!({ "answer": request.prompt }))),
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Error(err)) => Err(err),
            Some(Reply::Slow(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(AutomationResponse::ok(serde_json::json!("late")))
            }
        }
    }
}

/// Memory storage whose process-state writes always fail.
pub struct ReadOnlyProcessState {
    pub inner: MemoryStorage,
}

impl Storage for ReadOnlyProcessState {
    fn get_queue(&self) -> Result<Vec<QueueItem>, StorageError> {
        self.inner.get_queue()
    }

    fn set_queue(&self, items: &[QueueItem]) -> Result<(), StorageError> {
        self.inner.set_queue(items)
    }

    fn get_settings(&self) -> Result<Settings, StorageError> {
        self.inner.get_settings()
    }

    fn set_settings(&self, patch: SettingsPatch) -> Result<Settings, StorageError> {
        self.inner.set_settings(patch)
    }

    fn get_process_state(&self) -> Result<Option<ProcessState>, StorageError> {
        self.inner.get_process_state()
    }

    fn set_process_state(&self, _patch: ProcessStatePatch) -> Result<ProcessState, StorageError> {
        Err(StorageError::Io(std::io::Error::other("session storage full")))
    }

    fn put(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError> {
        self.inner.put(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key)
    }
}

pub fn tab(id: &str, url: &str) -> TabInfo {
    TabInfo {
        id: TabId::from(id),
        url: url.to_string(),
    }
}

pub fn item(id: &str) -> QueueItem {
    QueueItem::new(format!("prompt {id}")).with_id(id)
}

pub fn status_of(storage: &MemoryStorage, id: &str) -> ItemStatus {
    find(storage, id).status
}

pub fn find(storage: &MemoryStorage, id: &str) -> QueueItem {
    let id = ItemId::from(id);
    storage
        .get_queue()
        .unwrap()
        .into_iter()
        .find(|item| item.id == id)
        .expect("item present")
}

pub fn mark_started(storage: &MemoryStorage) {
    storage
        .set_process_state(ProcessStatePatch::started())
        .unwrap();
}

pub fn arc<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
