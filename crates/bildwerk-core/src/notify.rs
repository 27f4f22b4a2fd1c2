// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// User-facing notifications.
//
// Pipeline operations report progress through an injected sink instead of a
// global toast service. `TracingSink` forwards to the log; `NotificationQueue`
// keeps a bounded list of pending messages for a front end to display and
// expires them when its own timer says so.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

/// How a notification should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationLevel {
    /// Display lifetime. Errors stay up a little longer.
    pub fn lifetime(&self) -> Duration {
        match self {
            Self::Error => Duration::from_millis(4000),
            _ => Duration::from_millis(3000),
        }
    }
}

/// Fire-and-forget notification capability.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, level: NotificationLevel, message: &str);

    fn info(&self, message: &str) {
        self.notify(NotificationLevel::Info, message);
    }

    fn success(&self, message: &str) {
        self.notify(NotificationLevel::Success, message);
    }

    fn warning(&self, message: &str) {
        self.notify(NotificationLevel::Warning, message);
    }

    fn error(&self, message: &str) {
        self.notify(NotificationLevel::Error, message);
    }
}

/// Sink that writes notifications to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, level: NotificationLevel, message: &str) {
        match level {
            NotificationLevel::Info | NotificationLevel::Success => {
                info!(level = ?level, "{message}")
            }
            NotificationLevel::Warning => warn!("{message}"),
            NotificationLevel::Error => error!("{message}"),
        }
    }
}

/// A notification waiting to be shown or dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub level: NotificationLevel,
    pub message: String,
    pub expires_at: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    next_id: u64,
    pending: VecDeque<Notification>,
}

/// Bounded queue of pending notifications.
///
/// When full, the oldest entry is evicted to make room.
#[derive(Debug)]
pub struct NotificationQueue {
    capacity: usize,
    state: Mutex<QueueState>,
}

impl NotificationQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Enqueue a message stamped against `now`, returning its id.
    pub fn push_at(&self, level: NotificationLevel, message: &str, now: Instant) -> u64 {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        while state.pending.len() >= self.capacity {
            state.pending.pop_front();
        }
        state.pending.push_back(Notification {
            id,
            level,
            message: message.to_string(),
            expires_at: now + level.lifetime(),
        });
        id
    }

    /// Drop every notification whose lifetime has elapsed. Returns how many
    /// were removed.
    pub fn expire(&self, now: Instant) -> usize {
        let mut state = self.lock();
        let before = state.pending.len();
        state.pending.retain(|n| n.expires_at > now);
        before - state.pending.len()
    }

    /// Remove one notification. Returns `false` if it was already gone.
    pub fn dismiss(&self, id: u64) -> bool {
        let mut state = self.lock();
        let before = state.pending.len();
        state.pending.retain(|n| n.id != id);
        state.pending.len() != before
    }

    /// Snapshot of pending notifications, oldest first.
    pub fn pending(&self) -> Vec<Notification> {
        self.lock().pending.iter().cloned().collect()
    }

    /// Take every pending notification, oldest first, leaving the queue
    /// empty.
    pub fn drain(&self) -> Vec<Notification> {
        self.lock().pending.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl NotificationSink for NotificationQueue {
    fn notify(&self, level: NotificationLevel, message: &str) {
        self.push_at(level, message, Instant::now());
    }
}
