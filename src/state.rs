//! Process-wide operation state: recent errors and the loading indicator.
//!
//! The [`OperationStore`] is created once at startup and shared by handle.
//! Presentation code never mutates it; it reads [`OperationState`]
//! snapshots or subscribes to a `watch` channel that is notified after every
//! change.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{ErrorCode, NormalizedError, Severity};

/// Default cap on the error history.
pub const DEFAULT_MAX_ERRORS: usize = 5;

/// How `set_loading` calls combine when operations overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingMode {
    /// Each `set_loading(true)` must be paired with a `set_loading(false)`;
    /// loading stays on while any operation is outstanding.
    #[default]
    Counted,
    /// A single boolean. The first operation to finish clears it even if
    /// another one is still running.
    Flag,
}

/// Snapshot of the operation state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationState {
    errors: Vec<NormalizedError>,
    in_flight: usize,
}

impl OperationState {
    /// Recorded errors, most recent first.
    pub fn errors(&self) -> &[NormalizedError] {
        &self.errors
    }

    /// The most recently recorded error still present. Always the head of
    /// [`errors`](Self::errors).
    pub fn last_error(&self) -> Option<&NormalizedError> {
        self.errors.first()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    /// Number of outstanding tracked operations (0 or 1 in flag mode).
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn critical_errors(&self) -> Vec<&NormalizedError> {
        self.errors
            .iter()
            .filter(|e| e.severity() == Severity::Critical)
            .collect()
    }

    pub fn has_network_errors(&self) -> bool {
        self.errors
            .iter()
            .any(|e| e.code() == ErrorCode::NetworkError)
    }

    pub fn has_wallet_errors(&self) -> bool {
        self.errors.iter().any(|e| e.code().is_wallet_error())
    }

    pub fn total_errors(&self) -> usize {
        self.errors.len()
    }

    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Owner of the [`OperationState`].
///
/// Mutations happen only through the executor, the retry path and the
/// explicit dismiss operations.
#[derive(Debug)]
pub struct OperationStore {
    state: watch::Sender<OperationState>,
    max_errors: usize,
    loading_mode: LoadingMode,
}

impl Default for OperationStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ERRORS, LoadingMode::default())
    }
}

impl OperationStore {
    /// Creates a store keeping at most `max_errors` entries (minimum 1).
    pub fn new(max_errors: usize, loading_mode: LoadingMode) -> Self {
        let (state, _) = watch::channel(OperationState::default());
        Self {
            state,
            max_errors: max_errors.max(1),
            loading_mode,
        }
    }

    pub fn max_errors(&self) -> usize {
        self.max_errors
    }

    pub fn loading_mode(&self) -> LoadingMode {
        self.loading_mode
    }

    /// Clones the current state.
    pub fn snapshot(&self) -> OperationState {
        self.state.borrow().clone()
    }

    /// Returns a receiver notified after every state change.
    pub fn subscribe(&self) -> watch::Receiver<OperationState> {
        self.state.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    pub fn last_error(&self) -> Option<NormalizedError> {
        self.state.borrow().last_error().cloned()
    }

    /// Prepends `error` and evicts the oldest entries beyond the cap.
    pub fn record(&self, error: NormalizedError) {
        if error.severity() == Severity::Critical {
            tracing::error!(
                code = %error.code(),
                message = error.technical_message(),
                operation = error.operation(),
                timestamp = %error.occurred_at().to_rfc3339(),
                "CRITICAL ERROR"
            );
        }

        let max = self.max_errors;
        self.state.send_modify(|state| {
            state.errors.insert(0, error);
            if state.errors.len() > max {
                let evicted = state.errors.len() - max;
                state.errors.truncate(max);
                tracing::debug!(evicted, max, "error history trimmed");
            }
        });
    }

    /// Removes every entry with `code`. Returns false, without notifying
    /// subscribers, when nothing matched.
    pub fn dismiss(&self, code: ErrorCode) -> bool {
        self.state.send_if_modified(|state| {
            let before = state.errors.len();
            state.errors.retain(|e| e.code() != code);
            state.errors.len() != before
        })
    }

    /// Empties the error history. Leaves the loading indicator untouched.
    pub fn dismiss_all(&self) {
        self.state.send_if_modified(|state| {
            if state.errors.is_empty() {
                return false;
            }
            state.errors.clear();
            true
        });
    }

    /// Marks an operation as started (`true`) or settled (`false`).
    ///
    /// In [`LoadingMode::Counted`] the calls are paired; in
    /// [`LoadingMode::Flag`] the value is stored as-is.
    pub fn set_loading(&self, loading: bool) {
        let mode = self.loading_mode;
        self.state.send_if_modified(|state| {
            let next = match (mode, loading) {
                (LoadingMode::Flag, flag) => usize::from(flag),
                (LoadingMode::Counted, true) => state.in_flight + 1,
                (LoadingMode::Counted, false) => state.in_flight.saturating_sub(1),
            };
            let changed = next != state.in_flight;
            state.in_flight = next;
            changed
        });
    }
}
