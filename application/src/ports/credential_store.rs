//! Credential Store port
//!
//! Supplies the read-only `{model → key}` map for a dispatch.

use super::backend_gateway::CredentialMap;

/// Source of backend API keys
///
/// The returned map is a snapshot: it is never mutated while a run uses it.
pub trait CredentialStore: Send + Sync {
    fn credentials(&self) -> CredentialMap;
}

/// Store that always returns the same map.
pub struct StaticCredentials(pub CredentialMap);

impl CredentialStore for StaticCredentials {
    fn credentials(&self) -> CredentialMap {
        self.0.clone()
    }
}
