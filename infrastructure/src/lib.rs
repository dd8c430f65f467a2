//! Infrastructure layer for thinking
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: the HTTP backend gateway, credential and
//! conversation stores, the JSONL run logger and configuration loading.

pub mod config;
pub mod conversation;
pub mod credentials;
pub mod gateway;
pub mod logging;

// Re-export commonly used types
pub use config::{
    ConfigLoader, ConfigValidationError, FileConfig, FileOutputConfig, FileOutputFormat,
};
pub use conversation::InMemoryConversationStore;
pub use credentials::{CredentialSource, EnvCredentialStore};
pub use gateway::{HttpBackendGateway, HttpGatewayConfig, ModelEndpoint};
pub use logging::JsonlRunLogger;
