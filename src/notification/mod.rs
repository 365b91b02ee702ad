//! Ephemeral user notifications (toasts).
//!
//! The executor and retry helper describe what happened as
//! [`Notification`] values and hand them to a [`NotificationSink`]. How they
//! are shown is up to the sink; the notification only carries the text, the
//! visual style and how long it should stay on screen.

mod renderer;

pub use renderer::{NotificationRenderer, Theme};

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::{NormalizedError, Severity, SuggestedAction};

/// Visual weight of a notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastStyle {
    /// Intrusive error toast for high and critical failures.
    Error,
    /// Softer warning toast for low and medium failures.
    Warning,
    Success,
    Info,
}

/// A notification about an operation outcome or a recovery step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    /// An operation failed and its error was recorded.
    Failure {
        /// Label of the failed operation.
        operation: String,
        /// Localized user message.
        message: String,
        severity: Severity,
        action: SuggestedAction,
    },

    /// An operation completed successfully.
    Success {
        message: String,
        /// Transaction signature, when the operation produced one.
        signature: Option<String>,
    },

    /// An automatic retry is scheduled.
    Retrying {
        /// The attempt that just failed (1-based).
        attempt: u32,
        max_attempts: u32,
        /// Delay before the next attempt.
        delay: Duration,
        reason: String,
    },
}

impl Notification {
    /// Creates a Failure notification from a recorded error.
    pub fn failure(error: &NormalizedError) -> Self {
        Self::Failure {
            operation: error.operation().to_string(),
            message: error.user_message().to_string(),
            severity: error.severity(),
            action: error.suggested_action(),
        }
    }

    pub fn success(message: impl Into<String>, signature: Option<String>) -> Self {
        Self::Success {
            message: message.into(),
            signature,
        }
    }

    pub fn retrying(
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
        reason: impl Into<String>,
    ) -> Self {
        Self::Retrying {
            attempt,
            max_attempts,
            delay,
            reason: reason.into(),
        }
    }

    /// Display style: error style for high and critical failures, warning
    /// style for the rest.
    pub fn style(&self) -> ToastStyle {
        match self {
            Self::Failure { severity, .. } if severity.is_intrusive() => ToastStyle::Error,
            Self::Failure { .. } => ToastStyle::Warning,
            Self::Success { .. } => ToastStyle::Success,
            Self::Retrying { .. } => ToastStyle::Info,
        }
    }

    /// How long the toast stays visible.
    pub fn duration(&self) -> Duration {
        match self {
            Self::Failure {
                severity: Severity::Critical,
                ..
            } => Duration::from_secs(8),
            Self::Failure {
                severity: Severity::High,
                ..
            } => Duration::from_secs(6),
            _ => Duration::from_secs(4),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    pub fn is_recovery(&self) -> bool {
        matches!(self, Self::Retrying { .. })
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failure {
                operation, message, ..
            } => write!(f, "{}: {}", operation, message),
            Self::Success { message, .. } => f.write_str(message),
            Self::Retrying {
                attempt,
                max_attempts,
                delay,
                reason,
            } => write!(
                f,
                "Retrying ({}/{}) in {} ms: {}",
                attempt,
                max_attempts,
                delay.as_millis(),
                reason
            ),
        }
    }
}

/// Destination for notifications.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Sink that writes notifications to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notification: Notification) {
        let duration_ms = notification.duration().as_millis() as u64;
        match notification.style() {
            ToastStyle::Error => tracing::error!(duration_ms, "{}", notification),
            ToastStyle::Warning => tracing::warn!(duration_ms, "{}", notification),
            ToastStyle::Success | ToastStyle::Info => {
                tracing::info!(duration_ms, "{}", notification)
            }
        }
    }
}

/// Sink that forwards notifications to a UI task over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::debug!("notification receiver dropped");
        }
    }
}

/// Sink that keeps every notification in memory, for inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    received: Mutex<Vec<Notification>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything received so far.
    pub fn received(&self) -> Vec<Notification> {
        self.received
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl NotificationSink for MemorySink {
    fn notify(&self, notification: Notification) {
        self.received
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, Locale};

    fn failure(code: ErrorCode) -> Notification {
        Notification::failure(&NormalizedError::new(code, "raw", Locale::En, "Send"))
    }

    #[test]
    fn test_failure_notification_text() {
        let notification = failure(ErrorCode::InsufficientFunds);
        assert_eq!(
            format!("{}", notification),
            format!(
                "Send: {}",
                ErrorCode::InsufficientFunds.user_message(Locale::En)
            )
        );
        assert!(notification.is_error());
        assert!(!notification.is_recovery());
    }

    #[test]
    fn test_style_follows_severity() {
        assert_eq!(failure(ErrorCode::WalletNotFound).style(), ToastStyle::Error);
        assert_eq!(failure(ErrorCode::NetworkError).style(), ToastStyle::Warning);
        assert_eq!(
            Notification::success("done", None).style(),
            ToastStyle::Success
        );
    }

    #[test]
    fn test_duration_follows_severity() {
        let critical = Notification::failure(
            &NormalizedError::new(ErrorCode::TransactionFailed, "x", Locale::En, "Send")
                .with_severity(Severity::Critical),
        );
        assert_eq!(critical.duration(), Duration::from_secs(8));
        assert_eq!(
            failure(ErrorCode::TransactionFailed).duration(),
            Duration::from_secs(6)
        );
        assert_eq!(
            failure(ErrorCode::UserRejected).duration(),
            Duration::from_secs(4)
        );
        assert_eq!(
            Notification::success("ok", None).duration(),
            Duration::from_secs(4)
        );
    }

    #[test]
    fn test_display_retrying() {
        let notification =
            Notification::retrying(2, 3, Duration::from_millis(2000), "network down");
        assert_eq!(
            format!("{}", notification),
            "Retrying (2/3) in 2000 ms: network down"
        );
        assert!(notification.is_recovery());
        assert_eq!(notification.style(), ToastStyle::Info);
    }

    #[test]
    fn test_memory_sink_collects() {
        let sink = MemorySink::new();
        sink.notify(Notification::success("a", None));
        sink.notify(Notification::success("b", Some("sig".into())));
        assert_eq!(sink.received().len(), 2);
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (sink, mut rx) = ChannelSink::new();
        sink.notify(Notification::success("sent", None));
        assert_eq!(rx.recv().await, Some(Notification::success("sent", None)));

        drop(rx);
        // A closed receiver is not an error for the sender side.
        sink.notify(Notification::success("dropped", None));
    }
}
