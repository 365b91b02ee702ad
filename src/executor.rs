//! The operation executor: the single entry point for user-triggered async work.
//!
//! [`OperationExecutor::run`] wraps a unit of work so that:
//! - it becomes the remembered retryable operation,
//! - previous errors are cleared and the loading indicator is raised (both optional),
//! - any failure, including a panic, is classified and recorded instead of
//!   propagating,
//! - the loading indicator is released on every exit path.
//!
//! [`OperationExecutor::retry_last`] re-enters the same pipeline with the
//! remembered unit.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::config::CoreConfig;
use crate::error::{Classifier, RawFailure};
use crate::notification::{Notification, NotificationSink, TracingSink};
use crate::state::OperationStore;

/// Type-erased, re-invocable unit of work.
type ErasedUnit = Arc<dyn Fn() -> BoxFuture<'static, Result<(), RawFailure>> + Send + Sync>;

/// The single remembered operation available for user-initiated retry.
#[derive(Clone)]
struct RetryableHandle {
    label: String,
    unit: ErasedUnit,
}

/// Per-call options for [`OperationExecutor::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Dismiss every recorded error before starting.
    pub clear_previous_errors: bool,
    /// Raise the loading indicator while the unit runs.
    pub show_loading: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            clear_previous_errors: true,
            show_loading: true,
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clear_previous_errors(mut self, clear: bool) -> Self {
        self.clear_previous_errors = clear;
        self
    }

    pub fn with_show_loading(mut self, show: bool) -> Self {
        self.show_loading = show;
        self
    }
}

/// Result of [`OperationExecutor::retry_last`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// No operation has been run yet; nothing happened.
    NothingToRetry,
    Succeeded,
    /// The retry failed and its error was recorded.
    Failed,
}

/// Raises the loading indicator on creation and releases it on drop.
#[must_use = "loading is released as soon as the guard is dropped"]
pub struct LoadingGuard<'a> {
    store: &'a OperationStore,
}

impl<'a> LoadingGuard<'a> {
    pub fn acquire(store: &'a OperationStore) -> Self {
        store.set_loading(true);
        Self { store }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.store.set_loading(false);
    }
}

/// Runs units of work against a shared [`OperationStore`].
///
/// Cloning is cheap; clones share the store, the classifier and the retry slot.
#[derive(Clone)]
pub struct OperationExecutor {
    store: Arc<OperationStore>,
    classifier: Arc<Classifier>,
    sink: Arc<dyn NotificationSink>,
    last: Arc<Mutex<Option<RetryableHandle>>>,
}

impl OperationExecutor {
    pub fn new(store: Arc<OperationStore>, classifier: Classifier) -> Self {
        Self {
            store,
            classifier: Arc::new(classifier),
            sink: Arc::new(TracingSink),
            last: Arc::new(Mutex::new(None)),
        }
    }

    /// Builds a store and classifier from configuration.
    pub fn from_config(config: &CoreConfig) -> Self {
        let store = OperationStore::new(config.max_errors, config.loading_mode);
        let classifier = Classifier::new().with_locale(config.locale);
        Self::new(Arc::new(store), classifier)
    }

    /// Forwards a notification for every recorded failure to `sink`.
    ///
    /// Without one, notifications go to the tracing log.
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn store(&self) -> &Arc<OperationStore> {
        &self.store
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Label of the remembered operation, if any.
    pub fn retryable_label(&self) -> Option<String> {
        self.slot().as_ref().map(|h| h.label.clone())
    }

    pub fn has_retryable(&self) -> bool {
        self.slot().is_some()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<RetryableHandle>> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `unit` under the operation pipeline.
    ///
    /// Returns `Some(value)` on success and `None` on failure. Failures never
    /// reach the caller; they are classified and recorded in the store.
    pub async fn run<F, Fut, T, E>(&self, label: &str, options: RunOptions, unit: F) -> Option<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<RawFailure> + Send + 'static,
    {
        let unit = Arc::new(unit);

        let erased: ErasedUnit = {
            let unit = Arc::clone(&unit);
            Arc::new(move || {
                let fut = unit();
                async move { fut.await.map(|_| ()).map_err(Into::into) }.boxed()
            })
        };
        *self.slot() = Some(RetryableHandle {
            label: label.to_string(),
            unit: erased,
        });

        self.execute(label, options, move || {
            let fut = unit();
            async move { fut.await.map_err(Into::into) }
        })
        .await
    }

    /// Re-runs the remembered operation with default options.
    ///
    /// Does nothing when no operation has been run.
    pub async fn retry_last(&self) -> RetryOutcome {
        let Some(handle) = self.slot().clone() else {
            return RetryOutcome::NothingToRetry;
        };

        tracing::info!(operation = %handle.label, "retrying last operation");
        let unit = handle.unit;
        match self
            .execute(&handle.label, RunOptions::default(), move || unit())
            .await
        {
            Some(()) => RetryOutcome::Succeeded,
            None => RetryOutcome::Failed,
        }
    }

    /// Sends a success notification to the sink.
    pub fn notify_success(&self, message: impl Into<String>, signature: Option<String>) {
        self.sink.notify(Notification::success(message, signature));
    }

    async fn execute<T, Fut>(
        &self,
        label: &str,
        options: RunOptions,
        invoke: impl FnOnce() -> Fut,
    ) -> Option<T>
    where
        Fut: Future<Output = Result<T, RawFailure>>,
    {
        if options.clear_previous_errors {
            self.store.dismiss_all();
        }
        let _loading = options
            .show_loading
            .then(|| LoadingGuard::acquire(&self.store));

        let outcome = match std::panic::catch_unwind(AssertUnwindSafe(invoke)) {
            Ok(fut) => AssertUnwindSafe(fut)
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(RawFailure::from_panic(payload))),
            Err(payload) => Err(RawFailure::from_panic(payload)),
        };

        match outcome {
            Ok(value) => {
                tracing::debug!(operation = label, "operation succeeded");
                Some(value)
            }
            Err(raw) => {
                self.record_failure(&raw, label);
                None
            }
        }
    }

    fn record_failure(&self, raw: &RawFailure, label: &str) {
        let error = self.classifier.normalize(raw, label);
        self.sink.notify(Notification::failure(&error));
        self.store.record(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::error::{ErrorCode, Severity, SuggestedAction};
    use crate::notification::MemorySink;
    use crate::state::LoadingMode;

    fn executor() -> OperationExecutor {
        OperationExecutor::new(Arc::new(OperationStore::default()), Classifier::new())
    }

    #[tokio::test]
    async fn test_success_returns_value() {
        let exec = executor();
        let result = exec
            .run("Fetch balance", RunOptions::default(), || async {
                Ok::<_, RawFailure>(1.5_f64)
            })
            .await;

        assert_eq!(result, Some(1.5));
        let state = exec.store().snapshot();
        assert!(state.is_healthy());
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_failure_is_classified_and_swallowed() {
        let exec = executor();
        let result = exec
            .run("Send", RunOptions::default(), || async {
                Err::<(), _>("insufficient funds for transaction")
            })
            .await;

        assert_eq!(result, None);
        let state = exec.store().snapshot();
        assert_eq!(state.total_errors(), 1);
        let error = state.last_error().unwrap();
        assert_eq!(error.code(), ErrorCode::InsufficientFunds);
        assert_eq!(error.suggested_action(), SuggestedAction::Refresh);
        assert_eq!(error.severity(), Severity::High);
        assert_eq!(error.operation(), "Send");
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_loading_is_true_only_while_running() {
        let exec = executor();
        let store = Arc::clone(exec.store());

        let observed = exec
            .run("Fetch", RunOptions::default(), move || {
                let store = Arc::clone(&store);
                async move { Ok::<_, RawFailure>(store.is_loading()) }
            })
            .await;

        assert_eq!(observed, Some(true));
        assert!(!exec.store().is_loading());
    }

    #[tokio::test]
    async fn test_loading_cleared_after_failure() {
        let exec = executor();
        let store = Arc::clone(exec.store());
        let seen = Arc::new(AtomicU32::new(0));
        let seen_in_unit = Arc::clone(&seen);

        let _ = exec
            .run("Fetch", RunOptions::default(), move || {
                let store = Arc::clone(&store);
                let seen = Arc::clone(&seen_in_unit);
                async move {
                    if store.is_loading() {
                        seen.fetch_add(1, Ordering::SeqCst);
                    }
                    Err::<(), _>("network down")
                }
            })
            .await;

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(!exec.store().is_loading());
    }

    #[tokio::test]
    async fn test_synchronous_panic_is_absorbed() {
        let exec = executor();
        let result: Option<()> = exec
            .run("Connect", RunOptions::default(), || -> futures::future::Ready<Result<(), RawFailure>> {
                panic!("provider exploded")
            })
            .await;

        assert_eq!(result, None);
        let state = exec.store().snapshot();
        assert!(!state.is_loading());
        let error = state.last_error().unwrap();
        assert_eq!(error.code(), ErrorCode::UnknownError);
        assert_eq!(error.technical_message(), "operation panicked: provider exploded");
    }

    #[tokio::test]
    async fn test_panic_inside_future_is_absorbed() {
        let exec = executor();
        let result: Option<()> = exec
            .run("Send", RunOptions::default(), || async {
                if true {
                    panic!("Transaction failed hard");
                }
                Ok::<(), RawFailure>(())
            })
            .await;

        assert_eq!(result, None);
        assert!(!exec.store().is_loading());
        assert_eq!(
            exec.store().last_error().unwrap().code(),
            ErrorCode::TransactionFailed
        );
    }

    #[tokio::test]
    async fn test_show_loading_false_never_raises() {
        let exec = executor();
        let store = Arc::clone(exec.store());
        let observed = exec
            .run(
                "Poll",
                RunOptions::new().with_show_loading(false),
                move || {
                    let store = Arc::clone(&store);
                    async move { Ok::<_, RawFailure>(store.is_loading()) }
                },
            )
            .await;
        assert_eq!(observed, Some(false));
    }

    #[tokio::test]
    async fn test_clear_previous_errors_option() {
        let exec = executor();
        let _ = exec
            .run("First", RunOptions::default(), || async { Err::<(), _>("network") })
            .await;

        let _ = exec
            .run(
                "Second",
                RunOptions::new().with_clear_previous_errors(false),
                || async { Err::<(), _>("Wallet locked") },
            )
            .await;
        assert_eq!(exec.store().snapshot().total_errors(), 2);

        let _ = exec
            .run("Third", RunOptions::default(), || async { Ok::<_, RawFailure>(()) })
            .await;
        assert!(exec.store().snapshot().is_healthy());
    }

    #[tokio::test]
    async fn test_retry_last_without_run_is_noop() {
        let exec = executor();
        let rx = exec.store().subscribe();

        assert_eq!(exec.retry_last().await, RetryOutcome::NothingToRetry);
        assert!(!rx.has_changed().unwrap());
        assert!(!exec.store().is_loading());
    }

    #[tokio::test]
    async fn test_retry_last_reinvokes_remembered_unit() {
        let exec = executor();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let first = exec
            .run("Send", RunOptions::default(), move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n == 1 {
                        Err("network timeout")
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(first, None);
        assert_eq!(exec.store().snapshot().total_errors(), 1);
        assert_eq!(exec.retryable_label().as_deref(), Some("Send"));

        assert_eq!(exec.retry_last().await, RetryOutcome::Succeeded);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(exec.store().snapshot().is_healthy());
        assert!(!exec.store().is_loading());
    }

    #[tokio::test]
    async fn test_retry_failure_is_recorded_under_original_label() {
        let exec = executor();
        let _ = exec
            .run("Connect", RunOptions::default(), || async {
                Err::<(), _>("Failed to connect")
            })
            .await;

        assert_eq!(exec.retry_last().await, RetryOutcome::Failed);
        let state = exec.store().snapshot();
        assert_eq!(state.total_errors(), 1);
        assert_eq!(state.last_error().unwrap().operation(), "Connect");
        assert_eq!(state.last_error().unwrap().code(), ErrorCode::ConnectionFailed);
    }

    #[tokio::test]
    async fn test_handle_overwritten_by_successful_run() {
        let exec = executor();
        let _ = exec
            .run("A", RunOptions::default(), || async { Err::<(), _>("boom") })
            .await;
        let _ = exec
            .run("B", RunOptions::default(), || async { Ok::<_, RawFailure>(()) })
            .await;
        assert_eq!(exec.retryable_label().as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_sink_receives_failure_notification() {
        let sink = Arc::new(MemorySink::new());
        let exec = executor().with_sink(sink.clone());

        let _ = exec
            .run("Connect", RunOptions::default(), || async {
                Err::<(), _>(RawFailure::new().with_code(4100))
            })
            .await;
        exec.notify_success("Connected", None);

        let received = sink.received();
        assert_eq!(received.len(), 2);
        assert!(received[0].is_error());
        assert!(format!("{}", received[0]).starts_with("Connect: "));
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failures_logged_without_attached_sink() {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let exec = executor();
        let _ = exec
            .run("Connect", RunOptions::default(), || async {
                Err::<(), _>(RawFailure::new().with_code(4100))
            })
            .await;
        exec.notify_success("Connected", None);

        let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Connect: "), "{}", output);
        assert!(output.contains("Connected"), "{}", output);
    }

    #[tokio::test]
    async fn test_from_config_applies_cap_and_mode() {
        let config = CoreConfig {
            max_errors: 2,
            loading_mode: LoadingMode::Flag,
            ..CoreConfig::default()
        };
        let exec = OperationExecutor::from_config(&config);
        assert_eq!(exec.store().max_errors(), 2);
        assert_eq!(exec.store().loading_mode(), LoadingMode::Flag);
    }
}
