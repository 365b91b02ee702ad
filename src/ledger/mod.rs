//! Ledger client boundary.
//!
//! The operation core never talks to the network itself. Everything it
//! needs from the ledger goes through [`LedgerClient`]; [`SimulatedLedger`]
//! is an in-memory implementation for the CLI and tests.

mod simulated;

pub use simulated::SimulatedLedger;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::error::RawFailure;

/// Errors reported by a ledger client or wallet provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Wallet provider error with an EIP-1193 style numeric code.
    #[error("{message}")]
    Provider { code: i64, message: String },

    /// Transport-level failure talking to the RPC node.
    #[error("network error: {0}")]
    Network(String),

    #[error("insufficient funds for transaction: need {needed} lamports, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("account not found: {0}")]
    AccountNotFound(String),
}

impl LedgerError {
    pub fn provider(code: i64, message: impl Into<String>) -> Self {
        Self::Provider {
            code,
            message: message.into(),
        }
    }
}

impl From<LedgerError> for RawFailure {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::Provider { code, message } => RawFailure::message(message).with_code(code),
            other => RawFailure::message(other.to_string()),
        }
    }
}

/// Transaction signature returned by a submitted transfer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Signature(String);

impl Signature {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `n` characters, for compact display.
    pub fn short(&self, n: usize) -> String {
        self.0.chars().take(n).collect()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Commitment reached by a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationStatus {
    Processed,
    Confirmed,
    Finalized,
    /// The transaction landed but failed on-chain.
    Failed(String),
}

impl ConfirmationStatus {
    /// True once the transaction reached at least `confirmed`.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Finalized)
    }
}

/// A ledger performance sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformanceSample {
    pub num_transactions: u64,
    pub sample_period_secs: u16,
}

impl PerformanceSample {
    /// Transactions per second over the sample, rounded.
    pub fn tps(&self) -> Option<u64> {
        if self.sample_period_secs == 0 {
            return None;
        }
        let tps = self.num_transactions as f64 / f64::from(self.sample_period_secs);
        Some(tps.round() as u64)
    }
}

/// Current network status as shown by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkStatus {
    pub slot: u64,
    pub tps: Option<u64>,
}

/// Asynchronous ledger operations used by the dashboard.
///
/// A client is bound to the connected wallet, so transfers always debit
/// the wallet's own account.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Balance of `account` in lamports.
    async fn get_balance(&self, account: &str) -> Result<u64, LedgerError>;

    /// Signs and submits a transfer of `lamports` to `destination`.
    async fn submit_transfer(&self, destination: &str, lamports: u64)
        -> Result<Signature, LedgerError>;

    /// Waits for the transaction to reach confirmed commitment.
    async fn confirm(&self, signature: &Signature) -> Result<ConfirmationStatus, LedgerError>;

    async fn get_slot(&self) -> Result<u64, LedgerError>;

    /// Most recent performance sample, if the node reports one.
    async fn recent_performance_sample(&self) -> Result<Option<PerformanceSample>, LedgerError>;

    /// Address of the connected wallet.
    fn wallet_address(&self) -> &str;
}
