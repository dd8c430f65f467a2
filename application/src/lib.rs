//! Application layer for thinking
//!
//! This crate contains the streaming pipeline, the orchestration use cases
//! and the port definitions. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod streaming;
pub mod use_cases;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::ExecutionParams;
pub use ports::{
    backend_gateway::{
        BackendGateway, BackendReply, BackendRequest, ByteStream, ChatPayload, Credential,
        CredentialMap, GatewayError, SummaryPayload,
    },
    conversation_store::ConversationStore,
    credential_store::{CredentialStore, StaticCredentials},
    progress::{NoProgress, ProgressNotifier},
    run_logger::{NoRunLogger, RunEvent, RunLogger},
};
pub use streaming::{Channel, ChannelEnd, FlushScheduler, SseDecoder};
pub use use_cases::orchestrate::{
    FanOutInput, OrchestrationError, Orchestrator, RelayInput, RunHandle, RunUpdate, SummaryInput,
};
pub use use_cases::summary::SkipReason;
