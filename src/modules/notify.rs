use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use derive_more::with_trait::Display;
use log::{error, info};
use tokio::time::Instant;

use crate::modules::config::Timings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum NoticeKind {
    #[display("success")]
    Success,
    #[display("error")]
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticePhase {
    Visible,
    /// Removal transition; the view fades the element out.
    Leaving,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub id: u64,
    pub message: String,
    pub kind: NoticeKind,
    pub phase: NoticePhase,
}

#[derive(Debug)]
struct Entry {
    id: u64,
    message: String,
    kind: NoticeKind,
    shown_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    entries: Vec<Entry>,
}

/// Transient toasts. Each `notify` call produces a new entry, visible for a
/// fixed window and then leaving for a short transition before it is dropped.
#[derive(Debug, Clone)]
pub struct NotificationCenter {
    inner: Rc<RefCell<Inner>>,
    visible_for: Duration,
    fade_for: Duration,
}

impl NotificationCenter {
    pub fn new(timings: &Timings) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner::default())),
            visible_for: timings.notice_visible(),
            fade_for: timings.notice_fade(),
        }
    }

    pub fn notify(&self, message: impl Into<String>, kind: NoticeKind) -> u64 {
        let message = message.into();
        match kind {
            NoticeKind::Success => info!("notice: {message}"),
            NoticeKind::Error => error!("notice: {message}"),
        }

        let now = Instant::now();
        let mut inner = self.inner.borrow_mut();
        self.prune(&mut inner, now);
        inner.next_id += 1;
        let id = inner.next_id;
        inner.entries.push(Entry {
            id,
            message,
            kind,
            shown_at: now,
        });
        id
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.notify(message, NoticeKind::Success)
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.notify(message, NoticeKind::Error)
    }

    /// Notifications still on screen, oldest first. Expired ones are dropped.
    pub fn visible(&self) -> Vec<Notice> {
        let now = Instant::now();
        let mut inner = self.inner.borrow_mut();
        self.prune(&mut inner, now);
        inner
            .entries
            .iter()
            .map(|entry| Notice {
                id: entry.id,
                message: entry.message.clone(),
                kind: entry.kind,
                phase: if now.duration_since(entry.shown_at) < self.visible_for {
                    NoticePhase::Visible
                } else {
                    NoticePhase::Leaving
                },
            })
            .collect()
    }

    fn prune(&self, inner: &mut Inner, now: Instant) {
        let lifetime = self.visible_for + self.fade_for;
        inner
            .entries
            .retain(|entry| now.duration_since(entry.shown_at) < lifetime);
    }

    /// Most recent notification still on screen.
    pub fn last(&self) -> Option<Notice> {
        self.visible().pop()
    }
}
