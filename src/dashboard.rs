//! Wallet dashboard actions.
//!
//! Each action is a thin async unit of work handed to the
//! [`OperationExecutor`], so failures end up classified in the shared store
//! instead of reaching the caller.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;

use crate::config::CoreConfig;
use crate::error::RawFailure;
use crate::executor::{OperationExecutor, RetryOutcome, RunOptions};
use crate::format::{explorer_url, is_valid_address, lamports_to_sol, sol_to_lamports};
use crate::ledger::{ConfirmationStatus, LedgerClient, NetworkStatus, Signature};
use crate::retry::{retry_with_backoff, RetryPolicy};

pub const FETCH_BALANCE: &str = "Fetch balance";
pub const SEND_TRANSFER: &str = "Send transaction";
pub const NETWORK_STATUS: &str = "Network status";

/// Input errors caught before anything is submitted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransferError {
    #[error("Invalid destination address: {0:?}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(f64),
}

impl From<TransferError> for RawFailure {
    fn from(error: TransferError) -> Self {
        RawFailure::message(error.to_string())
    }
}

/// Validates a transfer request and returns the amount in lamports.
pub fn validate_transfer(destination: &str, amount_sol: f64) -> Result<u64, TransferError> {
    let destination = destination.trim();
    if !is_valid_address(destination) {
        return Err(TransferError::InvalidAddress(destination.to_string()));
    }
    if !amount_sol.is_finite() || amount_sol <= 0.0 {
        return Err(TransferError::InvalidAmount(amount_sol));
    }
    match sol_to_lamports(amount_sol) {
        Some(lamports) if lamports > 0 => Ok(lamports),
        _ => Err(TransferError::InvalidAmount(amount_sol)),
    }
}

/// Dashboard actions over a ledger client.
pub struct Dashboard<L> {
    ledger: Arc<L>,
    executor: OperationExecutor,
    retry_policy: RetryPolicy,
    request_timeout: Duration,
    network: String,
    explorer: String,
    /// Signature of the most recent confirmed transfer.
    last_signature: Arc<Mutex<Option<Signature>>>,
}

impl<L: LedgerClient + 'static> Dashboard<L> {
    pub fn new(ledger: Arc<L>, executor: OperationExecutor) -> Self {
        Self::from_config(ledger, executor, &CoreConfig::default())
    }

    pub fn from_config(ledger: Arc<L>, executor: OperationExecutor, config: &CoreConfig) -> Self {
        Self {
            ledger,
            executor,
            retry_policy: config.retry_policy(),
            request_timeout: config.request_timeout(),
            network: config.network.clone(),
            explorer: config.explorer_url.clone(),
            last_signature: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn executor(&self) -> &OperationExecutor {
        &self.executor
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn explorer_url(&self, signature: &Signature) -> String {
        explorer_url(&self.explorer, signature.as_str(), &self.network)
    }

    pub fn last_signature(&self) -> Option<Signature> {
        self.last_signature
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn announce(&self, signature: &Signature) {
        tracing::info!(%signature, "transfer confirmed");
        self.executor.notify_success(
            format!("Transaction successful! Signature: {}...", signature.short(8)),
            Some(signature.to_string()),
        );
    }

    /// Fetches the balance of `account` in SOL.
    ///
    /// Earlier errors are left in place.
    pub async fn refresh_balance(&self, account: &str) -> Option<f64> {
        let ledger = Arc::clone(&self.ledger);
        let account = account.to_string();
        let deadline = self.request_timeout;

        self.executor
            .run(
                FETCH_BALANCE,
                RunOptions::default().with_clear_previous_errors(false),
                move || {
                    let ledger = Arc::clone(&ledger);
                    let account = account.clone();
                    async move {
                        let lamports = timeout(deadline, ledger.get_balance(&account)).await??;
                        Ok::<_, RawFailure>(lamports_to_sol(lamports))
                    }
                },
            )
            .await
    }

    /// Current slot and throughput, retried automatically on transient
    /// failures. Does not touch the operation store.
    pub async fn network_status(&self) -> Option<NetworkStatus> {
        let ledger = &self.ledger;
        let deadline = self.request_timeout;

        let result = retry_with_backoff(
            &self.retry_policy,
            self.executor.classifier(),
            NETWORK_STATUS,
            None,
            || async move {
                let slot = timeout(deadline, ledger.get_slot()).await??;
                let sample = timeout(deadline, ledger.recent_performance_sample()).await??;
                Ok::<_, RawFailure>(NetworkStatus {
                    slot,
                    tps: sample.and_then(|s| s.tps()),
                })
            },
        )
        .await;

        match result {
            Ok(status) => Some(status),
            Err(raw) => {
                let error = self.executor.classifier().normalize(&raw, NETWORK_STATUS);
                tracing::debug!(code = %error.code(), "network status unavailable");
                None
            }
        }
    }

    /// Sends `amount_sol` from the connected wallet to `destination`.
    ///
    /// Returns the confirmed signature on success and emits a success toast.
    pub async fn send_transfer(&self, destination: &str, amount_sol: f64) -> Option<Signature> {
        let ledger = Arc::clone(&self.ledger);
        let destination = destination.to_string();
        let deadline = self.request_timeout;
        let last_signature = Arc::clone(&self.last_signature);

        let signature = self
            .executor
            .run(SEND_TRANSFER, RunOptions::default(), move || {
                let ledger = Arc::clone(&ledger);
                let destination = destination.clone();
                let last_signature = Arc::clone(&last_signature);
                async move {
                    let lamports = validate_transfer(&destination, amount_sol)?;
                    let signature =
                        timeout(deadline, ledger.submit_transfer(destination.trim(), lamports))
                            .await??;
                    match timeout(deadline, ledger.confirm(&signature)).await?? {
                        ConfirmationStatus::Failed(reason) => Err(RawFailure::message(format!(
                            "Transaction failed: {}",
                            reason
                        ))),
                        _ => {
                            *last_signature.lock().unwrap_or_else(PoisonError::into_inner) =
                                Some(signature.clone());
                            Ok::<_, RawFailure>(signature)
                        }
                    }
                }
            })
            .await?;

        self.announce(&signature);
        Some(signature)
    }

    /// Re-runs whichever action ran last. A transfer that succeeds on retry
    /// gets the same success toast as a first-time success.
    pub async fn retry_last(&self) -> RetryOutcome {
        let label = self.executor.retryable_label();
        let outcome = self.executor.retry_last().await;
        if outcome == RetryOutcome::Succeeded && label.as_deref() == Some(SEND_TRANSFER) {
            if let Some(signature) = self.last_signature() {
                self.announce(&signature);
            }
        }
        outcome
    }
}
