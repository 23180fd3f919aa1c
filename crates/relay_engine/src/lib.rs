//! Relay engine: storage, automation bridge, processing loop and scheduler.
mod agent;
mod bridge;
mod clock;
mod engine;
mod events;
mod http_agent;
mod lock;
mod pacing;
mod persist;
mod processing;
mod scheduler;
mod store;
mod types;

pub use agent::{AgentError, AutomationAgent};
pub use bridge::{image_slot_key, pattern_matches, AutomationBridge, BridgeSettings};
pub use clock::{Clock, SystemClock};
pub use engine::{EngineConfig, EngineHandle, SCHEDULE_POLL_INTERVAL};
pub use events::{ChannelEventSink, EventSink};
pub use http_agent::{HttpAgentSettings, HttpAutomationAgent};
pub use lock::{EngineLock, LockError};
pub use pacing::{handshake_grace, inter_item_delay, pace_between_items, wait_for_retry};
pub use persist::{ensure_dir, AtomicFileWriter, FileStorage, PersistError};
pub use processing::{ProcessingLoop, INTERRUPTED_MESSAGE};
pub use scheduler::{next_daily, FireOutcome, ScheduleTick, Scheduler};
pub use store::{MemoryStorage, ProcessStateStore, Storage, StorageError};
pub use types::{
    AutomationRequest, AutomationResponse, BridgeError, BridgeFailure, EngineEvent, TabInfo,
};
