use crate::progress::WeeklyProgress;
use log::debug;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "session";
/// Sessions untouched for this long are discarded.
pub const SESSION_IDLE_LIMIT: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// A one-shot message shown on the next page render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// Per-browser-session state, passed explicitly into every operation.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub progress: WeeklyProgress,
    notices: Vec<Notice>,
}

impl SessionContext {
    pub fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    /// Pending notices, emptied as they are read.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

#[derive(Debug)]
struct Entry {
    context: SessionContext,
    last_seen: SystemTime,
}

/// All live sessions. Owned by the application state; nothing here is global.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Entry>>,
    idle_limit: Option<Duration>,
}

impl SessionStore {
    pub fn new() -> Self {
        SessionStore::with_idle_limit(SESSION_IDLE_LIMIT)
    }

    pub fn with_idle_limit(limit: Duration) -> Self {
        SessionStore {
            sessions: Mutex::new(HashMap::new()),
            idle_limit: Some(limit),
        }
    }

    /// A fresh session id.
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Run `f` against the session's context, creating an empty one if the
    /// id is unknown (first visit, expired, or server restarted).
    pub fn with_session<R>(&self, id: &str, f: impl FnOnce(&mut SessionContext) -> R) -> R {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = SystemTime::now();

        if let Some(limit) = self.idle_limit {
            sessions.retain(|_, entry| {
                now.duration_since(entry.last_seen)
                    .map(|idle| idle <= limit)
                    .unwrap_or(true)
            });
        }

        let live = sessions.len();
        let entry = sessions.entry(id.to_string()).or_insert_with(|| {
            debug!("new session ({} already live)", live);
            Entry {
                context: SessionContext::default(),
                last_seen: now,
            }
        });
        entry.last_seen = now;
        f(&mut entry.context)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
