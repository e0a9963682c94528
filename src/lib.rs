pub mod agent;
pub mod config;
pub mod dom;
pub mod notice;
pub mod storage;
pub mod types;

pub use agent::{AgentError, AgentState, ClickDisposition, PageAgent, Selection, StyleSnapshot};
pub use dom::{Dom, DomError, MemoryDom};
pub use notice::{Notice, NoticeBoard, NoticeKind, NoticeSink, Notifier};
pub use storage::{Settings, SettingsStore, StorageError};
pub use types::{Command, Marker, NodeId, PageEvent, StyleProperty, StylePayload};

/// Installs the fmt subscriber used by both binaries. `RUST_LOG` overrides the
/// default `info` level.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
