//! Byte stream → event → coalesced snapshot pipeline shared by every channel.

pub mod buffer;
pub mod decoder;

pub use buffer::{Channel, ChannelEnd, DEFAULT_FLUSH_INTERVAL, FlushScheduler};
pub use decoder::{DecodeError, MAX_PENDING_RECORD_BYTES, SseDecoder};
