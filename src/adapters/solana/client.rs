//! Solana JSON-RPC client
//!
//! Reads mint accounts (`getAccountInfo`, jsonParsed), supply
//! (`getTokenSupply`) and the largest holders (`getTokenLargestAccounts`).
//! Every call goes through the shared rate-limited access layer; addresses are
//! validated before anything is sent.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use super::types::{
    AccountInfoValue, LargestAccount, MintAccount, RpcResponse, TokenSupply, UiTokenAmount,
    WithContext,
};
use crate::adapters::access::{fetch_json, RateLimitedAccess};
use crate::ports::ProviderError;

/// Default per-request HTTP timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Parse a base58 address, failing before any network call
pub fn validate_address(address: &str) -> Result<Pubkey, ProviderError> {
    Pubkey::from_str(address.trim())
        .map_err(|e| ProviderError::Validation(format!("invalid address '{}': {}", address, e)))
}

/// Client for the Solana RPC methods the filter depends on
#[derive(Debug, Clone)]
pub struct SolanaRpcClient {
    access: Arc<RateLimitedAccess>,
    http: Client,
    commitment: String,
}

impl SolanaRpcClient {
    pub fn new(access: Arc<RateLimitedAccess>, request_timeout: Duration) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ProviderError::fatal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            access,
            http,
            commitment: "confirmed".to_string(),
        })
    }

    /// Use a different commitment level for reads
    pub fn with_commitment(mut self, commitment: impl Into<String>) -> Self {
        self.commitment = commitment.into();
        self
    }

    pub fn access(&self) -> &RateLimitedAccess {
        &self.access
    }

    /// Fetch and decode a mint account
    pub async fn get_mint_account(&self, mint: &str) -> Result<MintAccount, ProviderError> {
        validate_address(mint)?;

        let response: WithContext<Option<AccountInfoValue>> = self
            .call(
                "getAccountInfo",
                json!([mint, { "encoding": "jsonParsed", "commitment": self.commitment }]),
            )
            .await?;

        let value = response
            .value
            .ok_or_else(|| ProviderError::Fatal { status: Some(404), message: format!("account not found: {}", mint) })?;

        MintAccount::from_account(mint, value)
    }

    /// Fetch total supply in base units
    pub async fn get_token_supply(&self, mint: &str) -> Result<TokenSupply, ProviderError> {
        validate_address(mint)?;

        let response: WithContext<UiTokenAmount> = self
            .call("getTokenSupply", json!([mint, { "commitment": self.commitment }]))
            .await?;

        Ok(TokenSupply {
            amount: response.value.raw_amount()?,
            decimals: response.value.decimals,
        })
    }

    /// Fetch balances of the largest token accounts, largest first
    pub async fn get_largest_balances(&self, mint: &str) -> Result<Vec<u64>, ProviderError> {
        validate_address(mint)?;

        let response: WithContext<Vec<LargestAccount>> = self
            .call("getTokenLargestAccounts", json!([mint, { "commitment": self.commitment }]))
            .await?;

        let mut balances = response
            .value
            .iter()
            .map(|account| account.amount.raw_amount())
            .collect::<Result<Vec<u64>, _>>()?;
        balances.sort_unstable_by(|a, b| b.cmp(a));
        Ok(balances)
    }

    async fn call<R: DeserializeOwned>(&self, method: &'static str, params: Value) -> Result<R, ProviderError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        debug!(method, "RPC call");

        self.access
            .schedule(|endpoint| {
                let mut request = self.http.post(endpoint.base()).json(&body);
                if let Some(key) = &endpoint.api_key {
                    request = request.query(&[("api-key", key)]);
                }

                async move {
                    let response: RpcResponse<R> = fetch_json(request).await?;
                    if let Some(error) = response.error {
                        return Err(error.into_provider_error());
                    }
                    response
                        .result
                        .ok_or_else(|| ProviderError::DataShape(format!("{}: response has no result", method)))
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::access::{EndpointPool, ProviderEndpoint, RateLimiterConfig, RetryPolicy};

    fn client() -> SolanaRpcClient {
        let access = RateLimitedAccess::new(
            "rpc",
            // Unroutable: any dispatched request would fail, not hang on a real node
            EndpointPool::single(ProviderEndpoint::new("http://127.0.0.1:9")),
            RateLimiterConfig::default(),
            RetryPolicy::none(),
        );
        SolanaRpcClient::new(Arc::new(access), Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_validate_address() {
        assert!(validate_address("So11111111111111111111111111111111111111112").is_ok());
        assert!(validate_address("not-a-key").unwrap_err().is_validation());
        assert!(validate_address("").unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_invalid_address_makes_no_call() {
        let client = client();

        let err = client.get_mint_account("0OIl-bogus").await.unwrap_err();
        assert!(err.is_validation());
        let err = client.get_token_supply("bogus").await.unwrap_err();
        assert!(err.is_validation());
        let err = client.get_largest_balances("bogus").await.unwrap_err();
        assert!(err.is_validation());

        assert_eq!(client.access().stats().dispatched, 0);
    }
}
