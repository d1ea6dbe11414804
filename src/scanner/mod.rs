//! Batched balance lookups
//!
//! Addresses are fetched in fixed-width batches: a batch is dispatched, awaited as a whole,
//! and only then recorded and followed by the next one. Results are recorded in dispatch
//! order, so completion order within a batch never shows in the report.

use crate::blockchain::traits::BalanceOracle;
use crate::core::domain::{AddressCandidate, BalanceFilter, FetchFailure, ScanResult};
use crate::core::errors::ScanError;
use futures::future::{join_all, try_join_all};
use rust_decimal::Decimal;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Longest pause between two retries.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// What to do when a single balance lookup fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort the whole scan on the first failure.
    #[default]
    Abort,
    /// Retry with exponential backoff, then abort.
    Retry { max_attempts: u32, initial_delay: Duration },
    /// Leave the address out and keep going; failures are listed in the result.
    Record,
}

/// Runs an async operation until it succeeds, fails with a non-retryable error or
/// `max_attempts` is reached. The delay doubles after every attempt.
pub async fn retry_with_backoff<F, Fut, T>(
    mut operation: F,
    max_attempts: u32,
    delay: Duration,
) -> Result<T, ScanError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScanError>>,
{
    let mut current_delay = delay;
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() || attempt >= max_attempts => return Err(e),
            Err(e) => {
                debug!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}",
                    attempt, max_attempts, e, current_delay
                );
                tokio::time::sleep(current_delay).await;
                current_delay = (current_delay * 2).min(MAX_RETRY_DELAY);
                attempt += 1;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct BalanceScanner {
    batch_size: usize,
    policy: FailurePolicy,
}

impl Default for BalanceScanner {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE, FailurePolicy::default())
    }
}

impl BalanceScanner {
    /// A zero batch size is treated as one.
    pub fn new(batch_size: usize, policy: FailurePolicy) -> Self {
        Self { batch_size: batch_size.max(1), policy }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Fetches balances for `candidates` and keeps those the filter lets through.
    ///
    /// With `skip_balance` the oracle is never called and every candidate is recorded
    /// without an amount; the filter does not apply.
    pub async fn scan(
        &self,
        candidates: Vec<AddressCandidate>,
        skip_balance: bool,
        filter: BalanceFilter,
        oracle: &dyn BalanceOracle,
    ) -> Result<ScanResult, ScanError> {
        let mut result = ScanResult::new();

        if skip_balance {
            for candidate in candidates {
                result.record(candidate, None);
            }
            return Ok(result);
        }

        let total = candidates.len();
        let symbol = oracle.native_symbol().to_string();
        let mut done = 0;
        let mut hidden = 0;

        for batch in candidates.chunks(self.batch_size) {
            let outcomes = self.fetch_batch(batch, oracle).await?;

            for (candidate, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(balance) if filter.hides(&balance) => hidden += 1,
                    Ok(balance) => result.record(candidate.clone(), Some((symbol.as_str(), balance))),
                    Err(e) => result.record_failure(FetchFailure {
                        path: candidate.path.clone(),
                        address: candidate.address.clone(),
                        reason: e.to_string(),
                    }),
                }
            }

            done += batch.len();
            info!("Fetched balances {}/{}", done, total);
        }

        if hidden > 0 {
            info!("Hid {} addresses ({})", hidden, filter);
        }
        if !result.failures().is_empty() {
            warn!(
                "{} of {} balance lookups failed and were left out",
                result.failures().len(),
                total
            );
        }

        Ok(result)
    }

    /// Dispatches one batch and waits for all of it. Under `Abort`/`Retry` the first
    /// error is returned; under `Record` every outcome is returned.
    async fn fetch_batch(
        &self,
        batch: &[AddressCandidate],
        oracle: &dyn BalanceOracle,
    ) -> Result<Vec<Result<Decimal, ScanError>>, ScanError> {
        let fetches = batch.iter().map(|c| self.fetch_one(&c.address, oracle));

        match self.policy {
            FailurePolicy::Record => Ok(join_all(fetches).await),
            FailurePolicy::Abort | FailurePolicy::Retry { .. } => {
                let balances = try_join_all(fetches).await?;
                Ok(balances.into_iter().map(Ok).collect())
            }
        }
    }

    async fn fetch_one(&self, address: &str, oracle: &dyn BalanceOracle) -> Result<Decimal, ScanError> {
        match self.policy {
            FailurePolicy::Retry { max_attempts, initial_delay } => {
                retry_with_backoff(|| oracle.get_balance(address), max_attempts, initial_delay).await
            }
            FailurePolicy::Abort | FailurePolicy::Record => oracle.get_balance(address).await,
        }
    }
}
