//! A cloneable handle for observing and aborting a chat session from outside.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::events::ChatEvent;

/// A cloneable handle for poking the session from external code.
///
/// All fields are `Arc`-wrapped, so cloning is cheap.
#[derive(Clone)]
pub struct SessionHandle {
    pub(crate) cancel: Arc<Mutex<CancellationToken>>,
    pub(crate) idle_notify: Arc<tokio::sync::Notify>,
    pub(crate) is_running: Arc<AtomicBool>,
}

impl SessionHandle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            idle_notify: Arc::new(tokio::sync::Notify::new()),
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Abort the in-flight turn. No-op when idle.
    pub fn abort(&self) {
        self.cancel.lock().cancel();
    }

    /// Whether a turn is being processed
    pub fn is_loading(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// Wait until the current turn (if any) finishes.
    pub async fn wait_for_idle(&self) {
        let notified = self.idle_notify.notified();
        if !self.is_running.load(Ordering::Acquire) {
            return;
        }
        notified.await;
    }

    /// Wait until idle, with a timeout.
    /// Returns `true` if idle was reached, `false` on timeout.
    pub async fn wait_for_idle_timeout(&self, timeout: std::time::Duration) -> bool {
        if !self.is_running.load(Ordering::Acquire) {
            return true;
        }
        tokio::time::timeout(timeout, self.wait_for_idle())
            .await
            .is_ok()
    }

    /// Claim the session for one turn. Returns `None` if a turn is already running.
    pub(crate) fn try_begin(&self, events: &broadcast::Sender<ChatEvent>) -> Option<TurnGuard> {
        if self
            .is_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        let _ = events.send(ChatEvent::LoadingChanged { loading: true });

        Some(TurnGuard {
            handle: self.clone(),
            events: events.clone(),
            token,
        })
    }
}

/// Held for the duration of a turn. Dropping it clears the loading flag on
/// every exit path, panics included.
pub(crate) struct TurnGuard {
    handle: SessionHandle,
    events: broadcast::Sender<ChatEvent>,
    token: CancellationToken,
}

impl TurnGuard {
    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.handle.is_running.store(false, Ordering::Release);
        self.handle.idle_notify.notify_waiters();
        let _ = self.events.send(ChatEvent::LoadingChanged { loading: false });
    }
}
