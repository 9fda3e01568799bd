//! Navigation guard integration
//!
//! The core never inspects the navigation stack. It pushes "blocked" changes
//! to a [`NavigationGuard`] and publishes the inverse, "abortable", on a watch
//! channel that the navigation layer can poll or await.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Navigation layer hook
pub trait NavigationGuard {
    fn set_blocked(&self, blocked: bool);
}

/// Shared flag implementation of [`NavigationGuard`]
///
/// Clones share state, so the navigation layer keeps one clone and checks
/// `is_blocked` before popping the screen.
#[derive(Debug, Clone, Default)]
pub struct NavigationLock {
    blocked: Arc<AtomicBool>,
}

impl NavigationLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }
}

impl NavigationGuard for NavigationLock {
    fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
        debug!("Navigation {}", if blocked { "blocked" } else { "released" });
    }
}

/// Tracks the last blocked value and fans it out
pub(crate) struct NavigationState {
    guard: Option<Arc<dyn NavigationGuard>>,
    abortable_tx: watch::Sender<bool>,
    blocked: bool,
}

impl NavigationState {
    pub(crate) fn new() -> Self {
        let (abortable_tx, _) = watch::channel(true);
        Self {
            guard: None,
            abortable_tx,
            blocked: false,
        }
    }

    pub(crate) fn set_guard(&mut self, guard: Arc<dyn NavigationGuard>) {
        guard.set_blocked(self.blocked);
        self.guard = Some(guard);
    }

    /// Notify only on change
    pub(crate) fn update(&mut self, blocked: bool) {
        if blocked == self.blocked {
            return;
        }
        self.blocked = blocked;
        if let Some(guard) = &self.guard {
            guard.set_blocked(blocked);
        }
        self.abortable_tx.send_replace(!blocked);
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.abortable_tx.subscribe()
    }
}
