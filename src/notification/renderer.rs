//! Terminal rendering for toasts, the error list and the health indicator.

use owo_colors::{OwoColorize, Rgb};

use super::{Notification, ToastStyle};
use crate::error::{Locale, Severity};
use crate::state::OperationState;

/// 24-bit RGB palette for terminal output.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    /// Success - green (34, 197, 94)
    pub success: Rgb,
    /// Error and critical - red (239, 68, 68)
    pub error: Rgb,
    /// Warning and medium - yellow (234, 179, 8)
    pub warning: Rgb,
    /// Info and loading - blue (59, 130, 246)
    pub info: Rgb,
    /// Secondary text - gray (107, 114, 128)
    pub muted: Rgb,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            success: Rgb(34, 197, 94),
            error: Rgb(239, 68, 68),
            warning: Rgb(234, 179, 8),
            info: Rgb(59, 130, 246),
            muted: Rgb(107, 114, 128),
        }
    }
}

impl Theme {
    pub fn for_severity(&self, severity: Severity) -> Rgb {
        match severity {
            Severity::Critical | Severity::High => self.error,
            Severity::Medium => self.warning,
            Severity::Low => self.muted,
        }
    }

    pub fn for_style(&self, style: ToastStyle) -> Rgb {
        match style {
            ToastStyle::Error => self.error,
            ToastStyle::Warning => self.warning,
            ToastStyle::Success => self.success,
            ToastStyle::Info => self.info,
        }
    }
}

/// Renders operation state and notifications as plain or colored text.
#[derive(Debug, Clone)]
pub struct NotificationRenderer {
    theme: Theme,
    width: usize,
    colored: bool,
    locale: Locale,
}

impl Default for NotificationRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationRenderer {
    pub fn new() -> Self {
        Self {
            theme: Theme::default(),
            width: 60,
            colored: true,
            locale: Locale::En,
        }
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(20);
        self
    }

    pub fn with_colors(mut self, colored: bool) -> Self {
        self.colored = colored;
        self
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    fn paint(&self, text: &str, color: Rgb) -> String {
        if self.colored {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }

    fn paint_bold(&self, text: &str, color: Rgb) -> String {
        if self.colored {
            text.color(color).bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn border_line(&self, color: Rgb) -> String {
        self.paint(&"─".repeat(self.width.saturating_sub(2)), color)
    }

    /// Truncates to `max_chars` characters, respecting UTF-8 boundaries.
    fn safe_truncate(s: &str, max_chars: usize) -> String {
        if s.chars().count() <= max_chars {
            s.to_string()
        } else {
            let truncated: String = s.chars().take(max_chars.saturating_sub(3)).collect();
            format!("{}...", truncated)
        }
    }

    /// Renders a single toast line.
    pub fn render_toast(&self, notification: &Notification) -> String {
        let icon = match notification.style() {
            ToastStyle::Error => "✖",
            ToastStyle::Warning => "⚠",
            ToastStyle::Success => "✔",
            ToastStyle::Info => "↻",
        };
        let color = self.theme.for_style(notification.style());
        format!("{} {}", self.paint(icon, color), notification)
    }

    /// Renders the health indicator line.
    pub fn render_status(&self, state: &OperationState) -> String {
        if state.is_loading() {
            return format!(
                "{} {}",
                self.paint("●", self.theme.info),
                "Working..."
            );
        }
        if state.is_healthy() {
            return format!("{} {}", self.paint("●", self.theme.success), "Healthy");
        }
        let color = if state.has_network_errors() || state.has_wallet_errors() {
            self.theme.error
        } else {
            self.theme.warning
        };
        let noun = if state.total_errors() == 1 {
            "error"
        } else {
            "errors"
        };
        format!(
            "{} {} {}",
            self.paint("●", color),
            state.total_errors(),
            noun
        )
    }

    /// Renders the recent-error panel, most recent first.
    pub fn render_errors(&self, state: &OperationState) -> String {
        let mut output = String::new();
        let inner_width = self.width.saturating_sub(2);

        let frame = if state.is_healthy() {
            self.theme.success
        } else {
            self.theme.error
        };

        output.push_str(&format!("{}\n", self.border_line(frame)));
        let header = if state.is_healthy() {
            "No recent errors".to_string()
        } else {
            format!("Recent errors ({})", state.total_errors())
        };
        output.push_str(&format!(" {}\n", self.paint_bold(&header, frame)));
        output.push_str(&format!("{}\n", self.border_line(frame)));

        for error in state.errors() {
            let color = self.theme.for_severity(error.severity());
            let tag = format!("[{}]", error.severity().to_string().to_uppercase());
            output.push_str(&format!(
                " {} {}\n",
                self.paint_bold(&tag, color),
                self.paint(error.code().as_str(), self.theme.muted)
            ));

            let text = format!("{}: {}", error.operation(), error.user_message());
            output.push_str(&format!(
                "   {}\n",
                Self::safe_truncate(&text, inner_width.saturating_sub(3))
            ));

            let action = error.suggested_action().label(self.locale);
            output.push_str(&format!(
                "   {} {}\n",
                self.paint("→", self.theme.muted),
                self.paint(action, self.theme.info)
            ));
        }

        output.push_str(&self.border_line(frame));
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, NormalizedError};
    use crate::state::OperationStore;

    fn plain() -> NotificationRenderer {
        NotificationRenderer::new().with_colors(false)
    }

    #[test]
    fn test_safe_truncate() {
        assert_eq!(NotificationRenderer::safe_truncate("short", 10), "short");
        assert_eq!(
            NotificationRenderer::safe_truncate("ăâîșțăâîșț", 6),
            "ăâî..."
        );
    }

    #[test]
    fn test_render_toast_plain() {
        let line = plain().render_toast(&Notification::success("Saved", None));
        assert_eq!(line, "✔ Saved");
    }

    #[test]
    fn test_render_status() {
        let store = OperationStore::default();
        assert_eq!(plain().render_status(&store.snapshot()), "● Healthy");

        store.set_loading(true);
        assert_eq!(plain().render_status(&store.snapshot()), "● Working...");
        store.set_loading(false);

        store.record(NormalizedError::new(
            ErrorCode::NetworkError,
            "x",
            Locale::En,
            "Fetch",
        ));
        assert_eq!(plain().render_status(&store.snapshot()), "● 1 error");
    }

    #[test]
    fn test_render_errors_lists_entries() {
        let store = OperationStore::default();
        store.record(NormalizedError::new(
            ErrorCode::InsufficientFunds,
            "insufficient funds",
            Locale::En,
            "Send",
        ));

        let panel = plain().render_errors(&store.snapshot());
        assert!(panel.contains("Recent errors (1)"));
        assert!(panel.contains("[HIGH] INSUFFICIENT_FUNDS"));
        assert!(panel.contains("Send: Insufficient funds"));
        assert!(panel.contains("→ Refresh"));
    }

    #[test]
    fn test_render_errors_healthy() {
        let panel = plain().render_errors(&OperationState::default());
        assert!(panel.contains("No recent errors"));
    }

    #[test]
    fn test_localized_action_label() {
        let store = OperationStore::default();
        store.record(NormalizedError::new(
            ErrorCode::WalletNotFound,
            "No provider",
            Locale::Ro,
            "Conectare",
        ));
        let panel = plain()
            .with_locale(Locale::Ro)
            .render_errors(&store.snapshot());
        assert!(panel.contains("Instalează wallet"));
    }
}
