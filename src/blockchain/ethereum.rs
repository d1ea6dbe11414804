use async_trait::async_trait;
use ethers::{
    providers::{Http, JsonRpcClient, Middleware, Provider},
    types::Address,
};
use rust_decimal::Decimal;
use std::{str::FromStr, time::Duration};
use tracing::{debug, info};

use super::traits::BalanceOracle;
use crate::core::domain::ETH_SYMBOL;
use crate::core::errors::ScanError;

/// Per-request HTTP timeout
const RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// Ethereum JSON-RPC balance oracle
#[derive(Clone)]
pub struct EthereumClient<P: JsonRpcClient + Clone = Http> {
    provider: Provider<P>,
}

impl EthereumClient<Http> {
    /// Builds an HTTP client for `rpc_url`. No request is made until the first lookup.
    pub fn new(rpc_url: &str) -> Result<Self, ScanError> {
        let rpc_url_clean = rpc_url.trim();
        let parsed_url = reqwest::Url::parse(rpc_url_clean).map_err(|e| {
            ScanError::Config(format!("Invalid Ethereum RPC URL '{}': {}", rpc_url_clean, e))
        })?;

        // allow proxy environment vars
        let mut builder = reqwest::Client::builder().timeout(RPC_TIMEOUT);
        if let Ok(proxy) = std::env::var("HTTPS_PROXY").or_else(|_| std::env::var("HTTP_PROXY")) {
            if let Ok(p) = reqwest::Proxy::all(proxy) {
                builder = builder.proxy(p);
            }
        }
        let client = builder
            .build()
            .map_err(|e| ScanError::Config(format!("Failed to build HTTP client: {}", e)))?;

        info!("Using Ethereum RPC endpoint {}", parsed_url);
        let provider = Provider::new(Http::new_with_client(parsed_url, client));

        Ok(Self { provider })
    }
}

impl<P> EthereumClient<P>
where
    P: JsonRpcClient + Clone + Send + Sync,
{
    /// Wraps an existing provider, e.g. a `MockProvider` in tests.
    pub fn new_with_provider(provider: Provider<P>) -> EthereumClient<P> {
        EthereumClient { provider }
    }
}

#[async_trait]
impl<P> BalanceOracle for EthereumClient<P>
where
    P: JsonRpcClient + Clone + 'static + Send + Sync,
{
    async fn get_balance(&self, address: &str) -> Result<Decimal, ScanError> {
        debug!("Getting ETH balance for address: {}", address);

        let fail = |reason: String| ScanError::BalanceFetchFailed {
            address: address.to_string(),
            reason,
        };

        let parsed = Address::from_str(address)
            .map_err(|e| fail(format!("Invalid Ethereum address: {}", e)))?;

        let wei = self
            .provider
            .get_balance(parsed, None)
            .await
            .map_err(|e| fail(format!("RPC error: {}", e)))?;

        let balance_eth = ethers::utils::format_ether(wei);
        let balance = Decimal::from_str(&balance_eth)
            .map_err(|e| fail(format!("balance {} out of range: {}", balance_eth, e)))?;

        debug!("Balance: {} ETH", balance);
        Ok(balance)
    }

    fn native_symbol(&self) -> &str {
        ETH_SYMBOL
    }
}
