//! PumpPortal new-token subscription
//!
//! Connects to `wss://pumpportal.fun/api/data`, subscribes to token creation
//! events and forwards each one as a `TokenCandidate` on an mpsc channel.
//! Reconnects with capped exponential backoff; stops once the receiving side
//! of the channel is dropped.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, warn};

use super::types::{RawPumpMessage, SubscribeMessage};
use crate::domain::TokenCandidate;

/// Default WebSocket URL
pub const DEFAULT_WS_URL: &str = "wss://pumpportal.fun/api/data";

const RECONNECT_BASE_DELAY_MS: u64 = 1000;
const MAX_RECONNECT_DELAY_MS: u64 = 30_000;
const DEFAULT_MESSAGE_TIMEOUT_SECS: u64 = 60;
/// Maximum message size in bytes
const MAX_MESSAGE_SIZE: usize = 1_048_576;

#[derive(Debug, Error, PartialEq)]
pub enum SubscriptionError {
    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("Failed to parse message: {0}")]
    ParseError(String),

    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    #[error("No message received for {0:?}")]
    MessageTimeout(Duration),

    #[error("Server closed the connection")]
    Closed,
}

/// Subscription settings
#[derive(Debug, Clone)]
pub struct PumpPortalConfig {
    pub ws_url: String,
    /// Candidate channel buffer size
    pub channel_buffer_size: usize,
    /// Reconnect after this long without any message
    pub message_timeout: Duration,
    pub max_message_size: usize,
    /// Give up after this many consecutive failed connections (0 = never)
    pub max_reconnect_attempts: u32,
}

impl Default for PumpPortalConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            channel_buffer_size: 1000,
            message_timeout: Duration::from_secs(DEFAULT_MESSAGE_TIMEOUT_SECS),
            max_message_size: MAX_MESSAGE_SIZE,
            max_reconnect_attempts: 0,
        }
    }
}

/// Delay before reconnect number `attempt` (1-based)
pub fn reconnect_delay(attempt: u32) -> Duration {
    let exponential = RECONNECT_BASE_DELAY_MS.saturating_mul(2u64.pow(attempt.min(10)));
    Duration::from_millis(exponential.min(MAX_RECONNECT_DELAY_MS))
}

/// Decode one text frame; `Ok(None)` for frames that carry no candidate
pub fn parse_message(raw: &str, max_size: usize) -> Result<Option<TokenCandidate>, SubscriptionError> {
    if raw.len() > max_size {
        return Err(SubscriptionError::InvalidMessageFormat(format!(
            "message too large: {} bytes",
            raw.len()
        )));
    }

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if !trimmed.starts_with('{') {
        return Err(SubscriptionError::InvalidMessageFormat(
            "message is not a JSON object".to_string(),
        ));
    }

    let parsed: RawPumpMessage = serde_json::from_str(trimmed).map_err(|e| {
        SubscriptionError::ParseError(format!("line {}, column {}: {}", e.line(), e.column(), e))
    })?;

    match parsed {
        RawPumpMessage::Create(event) => {
            debug!(mint = %event.mint, symbol = %event.symbol, "New token created");
            Ok(Some(event.into_candidate()))
        }
        RawPumpMessage::Confirmation { message } => {
            debug!("Subscription confirmed: {}", message);
            Ok(None)
        }
        RawPumpMessage::Error { errors } => {
            warn!("Server error: {}", errors);
            Ok(None)
        }
    }
}

/// Background WebSocket subscription feeding a candidate channel
pub struct PumpPortalSubscription {
    config: PumpPortalConfig,
    tx: mpsc::Sender<TokenCandidate>,
}

impl PumpPortalSubscription {
    /// Start the subscription task and return the receiving end
    pub fn spawn(config: PumpPortalConfig) -> (JoinHandle<()>, mpsc::Receiver<TokenCandidate>) {
        let (tx, rx) = mpsc::channel(config.channel_buffer_size.max(1));
        let subscription = Self { config, tx };
        (tokio::spawn(subscription.run()), rx)
    }

    async fn run(self) {
        info!(url = %self.config.ws_url, "PumpPortal subscription starting");
        let mut attempts = 0u32;

        loop {
            match self.connect_and_stream(&mut attempts).await {
                Ok(()) => {
                    info!("Candidate receiver dropped, subscription stopping");
                    return;
                }
                Err(e) => warn!(error = %e, "PumpPortal connection lost"),
            }

            if self.tx.is_closed() {
                return;
            }

            attempts += 1;
            if self.config.max_reconnect_attempts > 0 && attempts > self.config.max_reconnect_attempts {
                warn!(attempts, "Reconnect limit reached, subscription stopping");
                return;
            }

            let delay = reconnect_delay(attempts);
            warn!("Reconnecting in {:?} (attempt {})", delay, attempts);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.tx.closed() => return,
            }
        }
    }

    /// Returns Ok when the receiver is gone, Err on any connection failure
    async fn connect_and_stream(&self, attempts: &mut u32) -> Result<(), SubscriptionError> {
        let (ws_stream, _) = connect_async(self.config.ws_url.as_str())
            .await
            .map_err(|e| SubscriptionError::ConnectionFailed(e.to_string()))?;
        let (mut sink, mut stream) = ws_stream.split();

        let subscribe = serde_json::to_string(&SubscribeMessage::new_token())
            .map_err(|e| SubscriptionError::WebSocketError(e.to_string()))?;
        sink.send(Message::Text(subscribe))
            .await
            .map_err(|e| SubscriptionError::WebSocketError(e.to_string()))?;

        info!("Subscribed to PumpPortal new token events");
        *attempts = 0;

        loop {
            let next = tokio::select! {
                next = tokio::time::timeout(self.config.message_timeout, stream.next()) => next,
                _ = self.tx.closed() => return Ok(()),
            };

            let message = match next {
                Err(_) => return Err(SubscriptionError::MessageTimeout(self.config.message_timeout)),
                Ok(None) => return Err(SubscriptionError::Closed),
                Ok(Some(Err(e))) => return Err(SubscriptionError::WebSocketError(e.to_string())),
                Ok(Some(Ok(message))) => message,
            };

            match message {
                Message::Text(text) => match parse_message(&text, self.config.max_message_size) {
                    Ok(Some(candidate)) => {
                        if self.tx.send(candidate).await.is_err() {
                            return Ok(());
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "Skipping malformed message"),
                },
                Message::Ping(payload) => {
                    sink.send(Message::Pong(payload))
                        .await
                        .map_err(|e| SubscriptionError::WebSocketError(e.to_string()))?;
                }
                Message::Close(frame) => {
                    debug!(?frame, "Close frame received");
                    return Err(SubscriptionError::Closed);
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CandidateOrigin;

    #[test]
    fn test_parse_create_message() {
        let raw = r#"{"mint":"MintNew111","traderPublicKey":"C","txType":"create","marketCapSol":31.2,"name":"N","symbol":"S"}"#;
        let candidate = parse_message(raw, MAX_MESSAGE_SIZE).unwrap().unwrap();
        assert_eq!(candidate.mint, "MintNew111");
        assert_eq!(candidate.origin, CandidateOrigin::Subscription);
        assert_eq!(candidate.feed.market_cap_sol, Some(31.2));
    }

    #[test]
    fn test_parse_ignores_confirmation_and_empty() {
        assert_eq!(parse_message(r#"{"message":"ok"}"#, MAX_MESSAGE_SIZE), Ok(None));
        assert_eq!(parse_message("   ", MAX_MESSAGE_SIZE), Ok(None));
    }

    #[test]
    fn test_parse_rejects_bad_frames() {
        assert!(matches!(
            parse_message("not json", MAX_MESSAGE_SIZE),
            Err(SubscriptionError::InvalidMessageFormat(_))
        ));
        assert!(matches!(
            parse_message("{\"mint\": ", MAX_MESSAGE_SIZE),
            Err(SubscriptionError::ParseError(_))
        ));
        let oversized = format!("{{\"pad\":\"{}\"}}", "x".repeat(64));
        assert!(matches!(
            parse_message(&oversized, 16),
            Err(SubscriptionError::InvalidMessageFormat(_))
        ));
    }

    #[test]
    fn test_reconnect_delay_capped() {
        assert_eq!(reconnect_delay(1), Duration::from_millis(2000));
        assert_eq!(reconnect_delay(2), Duration::from_millis(4000));
        assert_eq!(reconnect_delay(10), Duration::from_millis(30_000));
        assert_eq!(reconnect_delay(u32::MAX), Duration::from_millis(30_000));
    }
}
