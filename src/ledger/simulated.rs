//! In-memory ledger for the CLI and tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{ConfirmationStatus, LedgerClient, LedgerError, PerformanceSample, Signature};

/// Fee charged per transfer, in lamports.
pub const DEFAULT_FEE_LAMPORTS: u64 = 5_000;

#[derive(Debug)]
struct LedgerState {
    balances: HashMap<String, u64>,
    /// Failures returned by the next calls, in order, before any real work.
    scripted: VecDeque<LedgerError>,
    confirmations: HashMap<Signature, ConfirmationStatus>,
    /// On-chain failure reason for the next submitted transfer.
    pending_rejection: Option<String>,
    slot: u64,
    next_signature: u64,
    sample: Option<PerformanceSample>,
}

/// A ledger that lives entirely in memory.
///
/// Every call advances the slot by one. Failures can be queued with
/// [`fail_next`](Self::fail_next) to exercise error paths; each queued
/// failure is consumed by exactly one call.
#[derive(Debug)]
pub struct SimulatedLedger {
    wallet: String,
    fee: u64,
    latency: Duration,
    state: Mutex<LedgerState>,
}

impl SimulatedLedger {
    /// Creates a ledger where `wallet` holds `lamports`.
    pub fn new(wallet: impl Into<String>, lamports: u64) -> Self {
        let wallet = wallet.into();
        let mut balances = HashMap::new();
        balances.insert(wallet.clone(), lamports);
        Self {
            wallet,
            fee: DEFAULT_FEE_LAMPORTS,
            latency: Duration::ZERO,
            state: Mutex::new(LedgerState {
                balances,
                scripted: VecDeque::new(),
                confirmations: HashMap::new(),
                pending_rejection: None,
                slot: 1,
                next_signature: 1,
                sample: Some(PerformanceSample {
                    num_transactions: 150_000,
                    sample_period_secs: 60,
                }),
            }),
        }
    }

    pub fn with_fee(mut self, fee: u64) -> Self {
        self.fee = fee;
        self
    }

    /// Sleeps this long before answering each call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_account(self, account: impl Into<String>, lamports: u64) -> Self {
        self.lock().balances.insert(account.into(), lamports);
        self
    }

    pub fn with_sample(self, sample: Option<PerformanceSample>) -> Self {
        self.lock().sample = sample;
        self
    }

    /// Queues a failure for the next call.
    pub fn fail_next(&self, error: LedgerError) {
        self.lock().scripted.push_back(error);
    }

    /// Makes the next submitted transfer land but fail on-chain with `reason`.
    pub fn fail_next_confirmation(&self, reason: impl Into<String>) {
        self.lock().pending_rejection = Some(reason.into());
    }

    pub fn balance_of(&self, account: &str) -> Option<u64> {
        self.lock().balances.get(account).copied()
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits for the configured latency, then advances the slot and pops a
    /// scripted failure if one is queued.
    async fn begin_call(&self) -> Result<(), LedgerError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let mut state = self.lock();
        state.slot += 1;
        match state.scripted.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LedgerClient for SimulatedLedger {
    async fn get_balance(&self, account: &str) -> Result<u64, LedgerError> {
        self.begin_call().await?;
        self.lock()
            .balances
            .get(account)
            .copied()
            .ok_or_else(|| LedgerError::AccountNotFound(account.to_string()))
    }

    async fn submit_transfer(
        &self,
        destination: &str,
        lamports: u64,
    ) -> Result<Signature, LedgerError> {
        self.begin_call().await?;
        let mut state = self.lock();

        let available = state.balances.get(&self.wallet).copied().unwrap_or(0);
        let needed = lamports.saturating_add(self.fee);
        if available < needed {
            return Err(LedgerError::InsufficientFunds { needed, available });
        }

        state.balances.insert(self.wallet.clone(), available - needed);
        *state.balances.entry(destination.to_string()).or_insert(0) += lamports;

        let signature = Signature::new(format!("SimTx{:0>10}{}", state.next_signature, state.slot));
        state.next_signature += 1;
        let status = match state.pending_rejection.take() {
            Some(reason) => ConfirmationStatus::Failed(reason),
            None => ConfirmationStatus::Confirmed,
        };
        state.confirmations.insert(signature.clone(), status);

        tracing::debug!(%signature, destination, lamports, "simulated transfer submitted");
        Ok(signature)
    }

    async fn confirm(&self, signature: &Signature) -> Result<ConfirmationStatus, LedgerError> {
        self.begin_call().await?;
        self.lock()
            .confirmations
            .get(signature)
            .cloned()
            .ok_or_else(|| LedgerError::Transaction(format!("signature {} not found", signature)))
    }

    async fn get_slot(&self) -> Result<u64, LedgerError> {
        self.begin_call().await?;
        Ok(self.lock().slot)
    }

    async fn recent_performance_sample(&self) -> Result<Option<PerformanceSample>, LedgerError> {
        self.begin_call().await?;
        Ok(self.lock().sample)
    }

    fn wallet_address(&self) -> &str {
        &self.wallet
    }
}
