//! PumpPortal message types

use serde::{Deserialize, Serialize};

use crate::domain::{CandidateOrigin, FeedFields, TokenCandidate};

/// Token creation event from `subscribeNewToken`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PumpCreateEvent {
    /// Token mint address
    pub mint: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    /// Metadata URI (usually IPFS)
    #[serde(default)]
    pub uri: Option<String>,
    /// Creator wallet
    #[serde(rename = "traderPublicKey", default)]
    pub creator: String,
    /// Always "create" for this stream
    #[serde(default)]
    pub tx_type: Option<String>,
    /// Creator's initial buy in token units
    #[serde(default)]
    pub initial_buy: f64,
    /// Market cap in SOL right after creation
    #[serde(default)]
    pub market_cap_sol: f64,
    #[serde(default)]
    pub bonding_curve_key: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}

impl PumpCreateEvent {
    pub fn into_candidate(self) -> TokenCandidate {
        let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };

        TokenCandidate::new(self.mint, CandidateOrigin::Subscription).with_feed(FeedFields {
            market_cap_sol: Some(self.market_cap_sol),
            symbol: non_empty(self.symbol),
            name: non_empty(self.name),
            ..Default::default()
        })
    }
}

/// WebSocket subscription request
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeMessage {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
}

impl SubscribeMessage {
    /// Subscribe to new token launches
    pub fn new_token() -> Self {
        Self {
            method: "subscribeNewToken".to_string(),
            keys: None,
        }
    }
}

/// Any message the server sends on the new-token stream
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawPumpMessage {
    Create(PumpCreateEvent),
    /// Subscription acknowledgement
    Confirmation { message: String },
    Error { errors: String },
}
