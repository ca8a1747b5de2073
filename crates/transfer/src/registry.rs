//! Process-ID → task handle registry.
//!
//! Cancellation (and pause, for downloads) has to reach a task that runs
//! detached from the caller. The registry maps the caller's opaque
//! process ID to the control handles of the running task. Entries are
//! inserted when a task is accepted and removed right after its terminal
//! event, so cancelling an unknown or already-finished ID is a no-op.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::TransferError;

/// Control handles for one running transfer task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    cancel: CancellationToken,
    /// Pause switch; only download tasks carry one.
    pause: Option<watch::Sender<bool>>,
}

impl TaskHandle {
    /// Handle with cancellation only.
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            pause: None,
        }
    }

    /// Handle with cancellation and a pause switch.
    pub fn with_pause(cancel: CancellationToken, pause: watch::Sender<bool>) -> Self {
        Self {
            cancel,
            pause: Some(pause),
        }
    }
}

/// Thread-safe map from process ID to its in-flight task.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    inner: Arc<Mutex<HashMap<String, TaskHandle>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task under `process_id`.
    ///
    /// A second transfer started under an ID that is still running is a
    /// caller bug; it is rejected instead of silently replacing (and
    /// orphaning) the first task's handle.
    pub fn insert(&self, process_id: &str, handle: TaskHandle) -> Result<(), TransferError> {
        let mut map = self.inner.lock().unwrap();
        if map.contains_key(process_id) {
            return Err(TransferError::DuplicateProcess(process_id.to_string()));
        }
        map.insert(process_id.to_string(), handle);
        Ok(())
    }

    /// Drops the entry for `process_id`, if any.
    pub fn remove(&self, process_id: &str) {
        self.inner.lock().unwrap().remove(process_id);
    }

    /// Requests cancellation of the task registered under `process_id`.
    ///
    /// Returns `true` if a task was found. An unknown ID is silently
    /// accepted: the caller cannot tell "already finished" from "never
    /// existed", and neither case needs an error.
    pub fn cancel(&self, process_id: &str) -> bool {
        let map = self.inner.lock().unwrap();
        match map.get(process_id) {
            Some(handle) => {
                handle.cancel.cancel();
                true
            }
            None => {
                debug!(process_id, "cancel for unknown process, ignoring");
                false
            }
        }
    }

    /// Pauses or resumes the task registered under `process_id`.
    ///
    /// Returns `true` if a task with a pause switch was found.
    pub fn set_paused(&self, process_id: &str, paused: bool) -> bool {
        let map = self.inner.lock().unwrap();
        match map.get(process_id).and_then(|h| h.pause.as_ref()) {
            Some(pause) => {
                pause.send_replace(paused);
                true
            }
            None => {
                debug!(process_id, paused, "pause for unknown process, ignoring");
                false
            }
        }
    }

    /// Returns `true` if a task is registered under `process_id`.
    pub fn contains(&self, process_id: &str) -> bool {
        self.inner.lock().unwrap().contains_key(process_id)
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove() {
        let registry = TaskRegistry::new();
        registry
            .insert("p1", TaskHandle::new(CancellationToken::new()))
            .unwrap();
        assert!(registry.contains("p1"));
        assert_eq!(registry.len(), 1);

        registry.remove("p1");
        assert!(!registry.contains("p1"));
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_insert_rejected() {
        let registry = TaskRegistry::new();
        registry
            .insert("p1", TaskHandle::new(CancellationToken::new()))
            .unwrap();
        let err = registry
            .insert("p1", TaskHandle::new(CancellationToken::new()))
            .unwrap_err();
        assert!(matches!(err, TransferError::DuplicateProcess(id) if id == "p1"));
        // The original handle is untouched.
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn cancel_sets_token() {
        let registry = TaskRegistry::new();
        let token = CancellationToken::new();
        registry.insert("p1", TaskHandle::new(token.clone())).unwrap();

        assert!(!token.is_cancelled());
        assert!(registry.cancel("p1"));
        assert!(token.is_cancelled());

        // Cancelling again is harmless.
        assert!(registry.cancel("p1"));
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_unknown_is_noop() {
        let registry = TaskRegistry::new();
        assert!(!registry.cancel("ghost"));
    }

    #[test]
    fn pause_flips_watch_value() {
        let registry = TaskRegistry::new();
        let (pause_tx, pause_rx) = watch::channel(false);
        registry
            .insert(
                "d1",
                TaskHandle::with_pause(CancellationToken::new(), pause_tx),
            )
            .unwrap();

        assert!(registry.set_paused("d1", true));
        assert!(*pause_rx.borrow());
        assert!(registry.set_paused("d1", false));
        assert!(!*pause_rx.borrow());
    }

    #[test]
    fn pause_without_switch_is_noop() {
        let registry = TaskRegistry::new();
        registry
            .insert("p1", TaskHandle::new(CancellationToken::new()))
            .unwrap();
        // Uploads have no pause switch.
        assert!(!registry.set_paused("p1", true));
        assert!(!registry.set_paused("ghost", true));
    }
}
