//! Error classification for wallet operations.
//!
//! Raw failures from wallets and the ledger are normalized into a closed
//! taxonomy of [`ErrorCode`]s, each with a fixed [`Severity`], a
//! [`SuggestedAction`] and a localized user message.

pub mod classification;
pub mod classifier;

pub use classification::{
    ErrorCode, Locale, NormalizedError, Severity, SuggestedAction, UnknownErrorCode,
};
pub use classifier::{
    ClassificationRule, Classifier, FailureCode, RawFailure, UNKNOWN_FAILURE_MESSAGE,
};
