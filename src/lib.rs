//! walletops - error-aware operation core for a wallet dashboard
//!
//! Wraps user-triggered async operations (balance reads, transfers) so
//! that every failure is classified into a fixed taxonomy, recorded in a
//! bounded observable store, surfaced as a notification, and can be retried
//! by the user. Failures never propagate to callers.
//!
//! ```no_run
//! use std::sync::Arc;
//! use walletops::{CoreConfig, Dashboard, OperationExecutor, SimulatedLedger};
//!
//! # async fn demo() {
//! let config = CoreConfig::default();
//! let executor = OperationExecutor::from_config(&config);
//! let ledger = Arc::new(SimulatedLedger::new(
//!     "4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T",
//!     2_000_000_000,
//! ));
//! let dashboard = Dashboard::from_config(ledger, executor.clone(), &config);
//!
//! if dashboard
//!     .send_transfer("9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM", 0.5)
//!     .await
//!     .is_none()
//! {
//!     let state = executor.store().snapshot();
//!     println!("{:?}", state.last_error());
//! }
//! # }
//! ```

pub mod config;
pub mod dashboard;
pub mod error;
pub mod executor;
pub mod format;
pub mod ledger;
pub mod logging;
pub mod notification;
pub mod retry;
pub mod state;

pub use config::CoreConfig;
pub use dashboard::Dashboard;
pub use error::{Classifier, ErrorCode, NormalizedError, RawFailure, Severity, SuggestedAction};
pub use executor::{OperationExecutor, RetryOutcome, RunOptions};
pub use ledger::{LedgerClient, SimulatedLedger};
pub use state::{OperationState, OperationStore};
