//! Solana JSON-RPC wire types and the decoded values the filter needs

use serde::{Deserialize, Serialize};

use crate::ports::ProviderError;

/// JSON-RPC envelope
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

impl RpcErrorBody {
    /// Node-side conditions worth retrying: unhealthy node, internal error,
    /// slot skipped or not yet available
    pub fn is_transient(&self) -> bool {
        matches!(self.code, -32603 | -32005 | -32004 | -32007 | -32014 | -32016)
    }

    pub fn into_provider_error(self) -> ProviderError {
        let message = format!("RPC error {}: {}", self.code, self.message);
        if self.is_transient() {
            ProviderError::transient(message)
        } else {
            ProviderError::fatal(message)
        }
    }
}

/// `{ context, value }` wrapper used by most RPC results
#[derive(Debug, Clone, Deserialize)]
pub struct WithContext<T> {
    pub value: T,
}

/// getAccountInfo value with jsonParsed encoding
#[derive(Debug, Clone, Deserialize)]
pub struct AccountInfoValue {
    pub data: AccountData,
    pub owner: String,
    pub lamports: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AccountData {
    Parsed(ParsedAccountData),
    Raw(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsedAccountData {
    pub parsed: ParsedInfo,
    pub program: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsedInfo {
    pub info: MintInfo,
    #[serde(rename = "type")]
    pub account_type: String,
}

/// Mint account fields as reported by the SPL Token programs
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintInfo {
    pub mint_authority: Option<String>,
    pub freeze_authority: Option<String>,
    pub supply: String,
    pub decimals: u8,
    pub is_initialized: bool,
}

/// Amount object returned by getTokenSupply and getTokenLargestAccounts
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiTokenAmount {
    pub amount: String,
    pub decimals: u8,
    #[serde(default)]
    pub ui_amount_string: Option<String>,
}

impl UiTokenAmount {
    pub fn raw_amount(&self) -> Result<u64, ProviderError> {
        parse_amount(&self.amount)
    }
}

/// One entry of getTokenLargestAccounts
#[derive(Debug, Clone, Deserialize)]
pub struct LargestAccount {
    pub address: String,
    #[serde(flatten)]
    pub amount: UiTokenAmount,
}

/// Decoded mint account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintAccount {
    pub mint: String,
    pub mint_authority: Option<String>,
    pub freeze_authority: Option<String>,
    pub supply: u64,
    pub decimals: u8,
}

impl MintAccount {
    pub fn has_mint_authority(&self) -> bool {
        self.mint_authority.is_some()
    }

    pub fn has_freeze_authority(&self) -> bool {
        self.freeze_authority.is_some()
    }

    /// Supply adjusted for decimals
    pub fn supply_adjusted(&self) -> f64 {
        self.supply as f64 / 10f64.powi(self.decimals as i32)
    }

    /// Decode a jsonParsed getAccountInfo value
    pub fn from_account(mint: &str, value: AccountInfoValue) -> Result<Self, ProviderError> {
        let parsed = match value.data {
            AccountData::Parsed(parsed) => parsed,
            AccountData::Raw(_) => {
                return Err(ProviderError::DataShape(format!(
                    "{}: expected jsonParsed encoding, got raw data",
                    mint
                )))
            }
        };

        if parsed.parsed.account_type != "mint" {
            return Err(ProviderError::DataShape(format!(
                "{}: account type is '{}', expected 'mint'",
                mint, parsed.parsed.account_type
            )));
        }

        let info = parsed.parsed.info;
        Ok(Self {
            mint: mint.to_string(),
            supply: parse_amount(&info.supply)?,
            decimals: info.decimals,
            mint_authority: info.mint_authority,
            freeze_authority: info.freeze_authority,
        })
    }
}

/// Decoded token supply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSupply {
    pub amount: u64,
    pub decimals: u8,
}

fn parse_amount(raw: &str) -> Result<u64, ProviderError> {
    raw.parse()
        .map_err(|e| ProviderError::DataShape(format!("bad token amount '{}': {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINT_ACCOUNT: &str = r#"{
        "context": { "slot": 1 },
        "value": {
            "data": {
                "parsed": {
                    "info": {
                        "decimals": 6,
                        "freezeAuthority": null,
                        "isInitialized": true,
                        "mintAuthority": "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU",
                        "supply": "1000000000000000"
                    },
                    "type": "mint"
                },
                "program": "spl-token",
                "space": 82
            },
            "executable": false,
            "lamports": 1461600,
            "owner": "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",
            "rentEpoch": 0
        }
    }"#;

    #[test]
    fn test_decode_mint_account() {
        let wrapped: WithContext<Option<AccountInfoValue>> = serde_json::from_str(MINT_ACCOUNT).unwrap();
        let account = MintAccount::from_account("MintX", wrapped.value.unwrap()).unwrap();

        assert!(account.has_mint_authority());
        assert!(!account.has_freeze_authority());
        assert_eq!(account.supply, 1_000_000_000_000_000);
        assert!((account.supply_adjusted() - 1_000_000_000.0).abs() < 0.001);
    }

    #[test]
    fn test_non_mint_account_is_data_shape() {
        let json = MINT_ACCOUNT.replace("\"type\": \"mint\"", "\"type\": \"account\"");
        let wrapped: WithContext<Option<AccountInfoValue>> = serde_json::from_str(&json).unwrap();
        let err = MintAccount::from_account("MintX", wrapped.value.unwrap()).unwrap_err();
        assert!(matches!(err, ProviderError::DataShape(_)));
    }

    #[test]
    fn test_raw_data_is_data_shape() {
        let json = r#"{ "data": ["AAAA", "base64"], "owner": "x", "lamports": 1 }"#;
        let value: AccountInfoValue = serde_json::from_str(json).unwrap();
        assert!(matches!(
            MintAccount::from_account("MintX", value),
            Err(ProviderError::DataShape(_))
        ));
    }

    #[test]
    fn test_largest_accounts_decode() {
        let json = r#"{
            "context": { "slot": 1 },
            "value": [
                { "address": "A", "amount": "600", "decimals": 2, "uiAmount": 6.0, "uiAmountString": "6" },
                { "address": "B", "amount": "400", "decimals": 2, "uiAmount": 4.0, "uiAmountString": "4" }
            ]
        }"#;
        let wrapped: WithContext<Vec<LargestAccount>> = serde_json::from_str(json).unwrap();
        let amounts: Vec<u64> = wrapped.value.iter().map(|a| a.amount.raw_amount().unwrap()).collect();
        assert_eq!(amounts, vec![600, 400]);
        assert_eq!(wrapped.value[0].address, "A");
    }

    #[test]
    fn test_rpc_error_classification() {
        let busy = RpcErrorBody { code: -32005, message: "Node is behind".into() };
        assert!(busy.into_provider_error().is_retryable());

        let invalid = RpcErrorBody { code: -32602, message: "Invalid param".into() };
        assert!(!invalid.into_provider_error().is_retryable());
    }

    #[test]
    fn test_bad_amount() {
        let amount = UiTokenAmount { amount: "12x".into(), decimals: 0, ui_amount_string: None };
        assert!(matches!(amount.raw_amount(), Err(ProviderError::DataShape(_))));
    }
}
