use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::core::errors::ScanError;

/// Read-only balance source for one chain.
#[async_trait]
pub trait BalanceOracle: Send + Sync {
    /// Balance of `address` in whole units of [`native_symbol`](Self::native_symbol).
    async fn get_balance(&self, address: &str) -> Result<Decimal, ScanError>;

    /// Asset symbol the balances are denominated in (e.g. "ETH").
    fn native_symbol(&self) -> &str;
}
