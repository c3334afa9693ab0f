//! Pump.fun Adapter
//!
//! Real-time detection of pump.fun token launches via the PumpPortal
//! WebSocket API.
//!
//! # WebSocket Protocol
//!
//! `wss://pumpportal.fun/api/data` accepts JSON requests such as
//! `{"method":"subscribeNewToken"}` and streams one JSON object per created
//! token. Other objects on the stream are acknowledgements or errors.

mod subscription;
mod types;

pub use subscription::{
    parse_message, reconnect_delay, PumpPortalConfig, PumpPortalSubscription, SubscriptionError,
    DEFAULT_WS_URL,
};
pub use types::{PumpCreateEvent, RawPumpMessage, SubscribeMessage};
