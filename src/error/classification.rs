//! Normalized error types for the operation lifecycle.
//!
//! Every failure that crosses the executor boundary is reduced to a
//! [`NormalizedError`]: a stable [`ErrorCode`] from a closed taxonomy, the
//! original diagnostic text, a localized user-facing message, a
//! [`SuggestedAction`] for the presentation layer and a [`Severity`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier of a classified failure.
///
/// The serialized names are part of the external contract and must not change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The wallet could not be connected.
    ConnectionFailed,
    /// No wallet provider is installed or reachable.
    WalletNotFound,
    /// The user declined the request in the wallet.
    UserRejected,
    /// Connectivity or timeout problem talking to the network.
    NetworkError,
    /// The transaction was rejected or failed simulation.
    TransactionFailed,
    /// The account cannot cover the transfer and fees.
    InsufficientFunds,
    /// The wallet is locked and must be unlocked by the user.
    WalletLocked,
    /// The connected wallet does not implement the requested method.
    UnsupportedMethod,
    /// Nothing else matched.
    UnknownError,
}

impl ErrorCode {
    /// All codes, in taxonomy order.
    pub const ALL: [ErrorCode; 9] = [
        ErrorCode::ConnectionFailed,
        ErrorCode::WalletNotFound,
        ErrorCode::UserRejected,
        ErrorCode::NetworkError,
        ErrorCode::TransactionFailed,
        ErrorCode::InsufficientFunds,
        ErrorCode::WalletLocked,
        ErrorCode::UnsupportedMethod,
        ErrorCode::UnknownError,
    ];

    /// Returns the wire name of the code, e.g. `"USER_REJECTED"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionFailed => "CONNECTION_FAILED",
            Self::WalletNotFound => "WALLET_NOT_FOUND",
            Self::UserRejected => "USER_REJECTED",
            Self::NetworkError => "NETWORK_ERROR",
            Self::TransactionFailed => "TRANSACTION_FAILED",
            Self::InsufficientFunds => "INSUFFICIENT_FUNDS",
            Self::WalletLocked => "WALLET_LOCKED",
            Self::UnsupportedMethod => "UNSUPPORTED_METHOD",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Severity assigned to every error carrying this code.
    pub fn severity(&self) -> Severity {
        match self {
            Self::WalletNotFound
            | Self::InsufficientFunds
            | Self::UnsupportedMethod
            | Self::TransactionFailed => Severity::High,
            Self::UserRejected
            | Self::WalletLocked
            | Self::NetworkError
            | Self::ConnectionFailed
            | Self::UnknownError => Severity::Medium,
        }
    }

    /// Remedial affordance the presentation layer should offer.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Self::WalletNotFound => SuggestedAction::Install,
            Self::InsufficientFunds => SuggestedAction::Refresh,
            Self::UnsupportedMethod => SuggestedAction::Reconnect,
            Self::UserRejected
            | Self::WalletLocked
            | Self::NetworkError
            | Self::TransactionFailed
            | Self::ConnectionFailed
            | Self::UnknownError => SuggestedAction::Retry,
        }
    }

    /// Returns false for failures that need the user to act before another
    /// attempt can succeed (approve in wallet, install a wallet, switch wallet).
    pub fn is_auto_retryable(&self) -> bool {
        !matches!(
            self,
            Self::UserRejected | Self::WalletNotFound | Self::UnsupportedMethod
        )
    }

    /// Returns true for codes that point at the wallet itself rather than the network.
    pub fn is_wallet_error(&self) -> bool {
        matches!(self, Self::WalletNotFound | Self::ConnectionFailed)
    }

    /// Fixed user-facing template for this code.
    pub fn user_message(&self, locale: Locale) -> &'static str {
        match locale {
            Locale::En => match self {
                Self::UserRejected => {
                    "The wallet request was rejected. Approve it in your wallet to continue."
                }
                Self::WalletNotFound => {
                    "No compatible wallet was found. Please install Phantom, Solflare or another Solana wallet."
                }
                Self::WalletLocked => "Your wallet is locked. Unlock it and try again.",
                Self::InsufficientFunds => {
                    "Insufficient funds for this transaction. Check the SOL balance in your wallet."
                }
                Self::NetworkError => {
                    "Connectivity problem with the Solana network. Check your internet connection and try again."
                }
                Self::UnsupportedMethod => {
                    "This operation is not supported by the current wallet. Try a different wallet."
                }
                Self::TransactionFailed => {
                    "The transaction failed. Check the parameters and try again."
                }
                Self::ConnectionFailed => {
                    "Could not connect to the wallet. Make sure the wallet is available and try again."
                }
                Self::UnknownError => {
                    "An unexpected error occurred. Please try again or contact support."
                }
            },
            Locale::Ro => match self {
                Self::UserRejected => {
                    "Conexiunea la wallet a fost refuzată. Aprobă tranzacția în wallet pentru a continua."
                }
                Self::WalletNotFound => {
                    "Nu s-a găsit niciun wallet compatibil. Te rugăm să instalezi Phantom, Solflare sau alt wallet Solana."
                }
                Self::WalletLocked => {
                    "Wallet-ul este blocat. Te rugăm să-l deblochezi și să încerci din nou."
                }
                Self::InsufficientFunds => {
                    "Fonduri insuficiente pentru această tranzacție. Verifică balanța SOL din wallet."
                }
                Self::NetworkError => {
                    "Problemă de conectivitate la rețeaua Solana. Verifică conexiunea la internet și încearcă din nou."
                }
                Self::UnsupportedMethod => {
                    "Această operațiune nu este suportată de wallet-ul curent. Încearcă cu alt wallet."
                }
                Self::TransactionFailed => {
                    "Tranzacția a eșuat. Verifică parametrii și încearcă din nou."
                }
                Self::ConnectionFailed => {
                    "Nu s-a putut conecta la wallet. Verifică dacă wallet-ul este disponibil și încearcă din nou."
                }
                Self::UnknownError => {
                    "A apărut o eroare neașteptată. Te rugăm să încerci din nou sau să contactezi suportul."
                }
            },
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown error code name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown error code: {0}")]
pub struct UnknownErrorCode(pub String);

impl FromStr for ErrorCode {
    type Err = UnknownErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownErrorCode(s.to_string()))
    }
}

/// Hint for the remedial UI affordance attached to an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestedAction {
    /// Offer a retry button.
    Retry,
    /// Offer to reconnect or switch wallets.
    Reconnect,
    /// Offer to refresh balances.
    Refresh,
    /// Link to wallet installation.
    Install,
    /// No affordance.
    None,
}

impl SuggestedAction {
    /// Button text for this action.
    pub fn label(&self, locale: Locale) -> &'static str {
        match (locale, self) {
            (Locale::En, Self::Retry) => "Try again",
            (Locale::En, Self::Reconnect) => "Reconnect wallet",
            (Locale::En, Self::Refresh) => "Refresh",
            (Locale::En, Self::Install) => "Install wallet",
            (Locale::Ro, Self::Retry) => "Încearcă din nou",
            (Locale::Ro, Self::Reconnect) => "Reconectează wallet-ul",
            (Locale::Ro, Self::Refresh) => "Reîmprospătează",
            (Locale::Ro, Self::Install) => "Instalează wallet",
            (_, Self::None) => "OK",
        }
    }
}

impl fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Retry => "retry",
            Self::Reconnect => "reconnect",
            Self::Refresh => "refresh",
            Self::Install => "install",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

/// Ordinal urgency of an error. `Low < Medium < High < Critical`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Returns true for severities that warrant an intrusive notification.
    pub fn is_intrusive(&self) -> bool {
        *self >= Severity::High
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// Language of the user-facing templates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ro,
}

/// A classified failure.
///
/// Built only by the [`Classifier`](super::Classifier); read-only afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NormalizedError {
    code: ErrorCode,
    technical_message: String,
    user_message: String,
    suggested_action: SuggestedAction,
    severity: Severity,
    operation: String,
    occurred_at: DateTime<Utc>,
}

impl NormalizedError {
    pub(crate) fn new(
        code: ErrorCode,
        technical_message: impl Into<String>,
        locale: Locale,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            code,
            technical_message: technical_message.into(),
            user_message: code.user_message(locale).to_string(),
            suggested_action: code.suggested_action(),
            severity: code.severity(),
            operation: operation.into(),
            occurred_at: Utc::now(),
        }
    }

    /// Overrides the taxonomy severity, for rules registered with their own.
    pub(crate) fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Original diagnostic text. Developer-facing only.
    pub fn technical_message(&self) -> &str {
        &self.technical_message
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn suggested_action(&self) -> SuggestedAction {
        self.suggested_action
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Label of the operation that produced the failure.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

impl fmt::Display for NormalizedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operation, self.user_message)
    }
}

impl std::error::Error for NormalizedError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_wire_names_are_stable() {
        let names: Vec<&str> = ErrorCode::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "CONNECTION_FAILED",
                "WALLET_NOT_FOUND",
                "USER_REJECTED",
                "NETWORK_ERROR",
                "TRANSACTION_FAILED",
                "INSUFFICIENT_FUNDS",
                "WALLET_LOCKED",
                "UNSUPPORTED_METHOD",
                "UNKNOWN_ERROR",
            ]
        );
    }

    #[test]
    fn test_serde_names_match_as_str() {
        for code in ErrorCode::ALL {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn test_code_from_str() {
        assert_eq!(
            "INSUFFICIENT_FUNDS".parse::<ErrorCode>(),
            Ok(ErrorCode::InsufficientFunds)
        );
        assert_eq!(
            "network_error".parse::<ErrorCode>(),
            Ok(ErrorCode::NetworkError)
        );
        assert!("NOPE".parse::<ErrorCode>().is_err());
    }

    #[test]
    fn test_taxonomy_table() {
        use ErrorCode::*;
        use Severity::*;
        use SuggestedAction::*;

        let table = [
            (UserRejected, Retry, Medium),
            (WalletNotFound, Install, High),
            (WalletLocked, Retry, Medium),
            (InsufficientFunds, Refresh, High),
            (NetworkError, Retry, Medium),
            (UnsupportedMethod, Reconnect, High),
            (TransactionFailed, Retry, High),
            (ConnectionFailed, Retry, Medium),
            (UnknownError, Retry, Medium),
        ];

        for (code, action, severity) in table {
            assert_eq!(code.suggested_action(), action, "action for {}", code);
            assert_eq!(code.severity(), severity, "severity for {}", code);
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
        assert!(Severity::High.is_intrusive());
        assert!(Severity::Critical.is_intrusive());
        assert!(!Severity::Medium.is_intrusive());
    }

    #[test]
    fn test_auto_retryable_excludes_user_intervention_codes() {
        assert!(!ErrorCode::UserRejected.is_auto_retryable());
        assert!(!ErrorCode::WalletNotFound.is_auto_retryable());
        assert!(!ErrorCode::UnsupportedMethod.is_auto_retryable());
        assert!(ErrorCode::NetworkError.is_auto_retryable());
        assert!(ErrorCode::TransactionFailed.is_auto_retryable());
    }

    #[test]
    fn test_every_code_has_templates_in_both_locales() {
        for code in ErrorCode::ALL {
            assert!(!code.user_message(Locale::En).is_empty());
            assert!(!code.user_message(Locale::Ro).is_empty());
            assert_ne!(code.user_message(Locale::En), code.user_message(Locale::Ro));
        }
    }

    #[test]
    fn test_action_labels() {
        assert_eq!(SuggestedAction::Retry.label(Locale::En), "Try again");
        assert_eq!(SuggestedAction::Install.label(Locale::Ro), "Instalează wallet");
        assert_eq!(SuggestedAction::None.label(Locale::Ro), "OK");
    }

    #[test]
    fn test_normalized_error_uses_template_not_raw_text() {
        let error = NormalizedError::new(
            ErrorCode::WalletLocked,
            "Wallet locked by extension",
            Locale::En,
            "Connect",
        );

        assert_eq!(error.technical_message(), "Wallet locked by extension");
        assert_eq!(
            error.user_message(),
            ErrorCode::WalletLocked.user_message(Locale::En)
        );
        assert_eq!(error.operation(), "Connect");
        assert_eq!(format!("{}", error), format!("Connect: {}", error.user_message()));
    }

    #[test]
    fn test_with_severity_overrides_table() {
        let error = NormalizedError::new(ErrorCode::WalletNotFound, "x", Locale::En, "op");
        assert_eq!(error.severity(), Severity::High);
        let error = error.with_severity(Severity::Critical);
        assert_eq!(error.severity(), Severity::Critical);
        assert_eq!(error.code(), ErrorCode::WalletNotFound);
    }
}
