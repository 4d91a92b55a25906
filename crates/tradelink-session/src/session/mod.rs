/*
[INPUT]:  Login results, refresh results and transport signals
[OUTPUT]: Canonical session state, persisted and kept fresh
[POS]:    Session layer - state machine, persistence, scheduler and facade
[UPDATE]: When session lifecycle components are added or rewired
*/

pub mod events;
pub mod manager;
pub mod notice;
pub mod scheduler;
pub mod state;
pub mod storage;

pub use events::{AuthEventSource, TransportEvent, TransportEvents};
pub use manager::{SessionManager, SessionManagerBuilder};
pub use notice::{Notice, NoticeLevel, Notifier, RecordingNotifier, TracingNotifier};
pub use scheduler::{DEFAULT_REFRESH_INTERVAL, RefreshScheduler, RefreshTick};
pub use state::{Session, SessionAction};
pub use storage::{FileStore, KeyValueStore, MemoryStore, SessionStorage, StoredSession};
