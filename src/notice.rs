use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeKind {
    Success,
    Rejection,
}

impl NoticeKind {
    /// Overlay background colour.
    pub fn color(self) -> &'static str {
        match self {
            NoticeKind::Success => "#4CAF50",
            NoticeKind::Rejection => "#e53935",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
    pub message: String,
}

/// Where notices are rendered.
///
/// `dismiss` carries the id of the notice being retired; a sink showing a
/// newer notice must leave it in place. It is called from the blocking pool,
/// so it may make synchronous calls into the page.
pub trait NoticeSink: Send + Sync + 'static {
    fn show(&self, notice: &Notice);
    fn dismiss(&self, id: u64);
}

/// Single-slot notice register.
///
/// Showing a notice aborts the dismissal task of the one before it, so at
/// most one notice is visible and only its timer is pending.
pub struct Notifier {
    sink: Arc<dyn NoticeSink>,
    runtime: Handle,
    ttl: Duration,
    next_id: u64,
    pending: Option<JoinHandle<()>>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NoticeSink>, runtime: Handle, ttl: Duration) -> Self {
        Self {
            sink,
            runtime,
            ttl,
            next_id: 0,
            pending: None,
        }
    }

    pub fn success(&mut self, message: impl Into<String>) -> u64 {
        self.notify(NoticeKind::Success, message.into())
    }

    pub fn rejection(&mut self, message: impl Into<String>) -> u64 {
        self.notify(NoticeKind::Rejection, message.into())
    }

    pub fn notify(&mut self, kind: NoticeKind, message: String) -> u64 {
        if let Some(task) = self.pending.take() {
            task.abort();
        }

        self.next_id += 1;
        let notice = Notice {
            id: self.next_id,
            kind,
            message,
        };
        debug!(id = notice.id, kind = ?notice.kind, message = %notice.message, "showing notice");
        self.sink.show(&notice);

        let sink = Arc::clone(&self.sink);
        let ttl = self.ttl;
        let id = notice.id;
        self.pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Err(e) = tokio::task::spawn_blocking(move || sink.dismiss(id)).await {
                warn!(id, error = %e, "notice dismissal failed");
            }
        }));
        id
    }

    /// True while a dismissal timer is outstanding.
    pub fn has_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

#[derive(Debug, Default)]
struct BoardState {
    current: Option<Notice>,
    shown: Vec<Notice>,
    dismissed: Vec<u64>,
}

/// In-memory sink that remembers what it displayed.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    state: Mutex<BoardState>,
}

impl NoticeBoard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn current(&self) -> Option<Notice> {
        self.lock().current.clone()
    }

    pub fn last_shown(&self) -> Option<Notice> {
        self.lock().shown.last().cloned()
    }

    pub fn shown(&self) -> Vec<Notice> {
        self.lock().shown.clone()
    }

    pub fn dismissed(&self) -> Vec<u64> {
        self.lock().dismissed.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BoardState> {
        // A panic while holding the lock leaves the board readable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl NoticeSink for NoticeBoard {
    fn show(&self, notice: &Notice) {
        let mut state = self.lock();
        state.current = Some(notice.clone());
        state.shown.push(notice.clone());
    }

    fn dismiss(&self, id: u64) {
        let mut state = self.lock();
        state.dismissed.push(id);
        if state.current.as_ref().is_some_and(|n| n.id == id) {
            state.current = None;
        }
    }
}
