//! Credential store backed by environment variables and the config file.

use thinking_application::{Credential, CredentialMap, CredentialStore};
use thinking_domain::Model;
use tracing::debug;

/// Where one model's key may come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSource {
    pub model: Model,
    /// Checked first
    pub env_var: String,
    /// `[credentials]` entry, used when the variable is unset or blank
    pub configured: Option<String>,
}

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves keys from the environment, falling back to the config file.
///
/// Every call to [`CredentialStore::credentials`] re-reads the sources, so
/// the snapshot handed to a run reflects the environment at dispatch time.
pub struct EnvCredentialStore {
    sources: Vec<CredentialSource>,
    lookup: Lookup,
}

impl EnvCredentialStore {
    pub fn new(sources: Vec<CredentialSource>) -> Self {
        Self::with_lookup(sources, |name| std::env::var(name).ok())
    }

    /// Use a custom variable lookup instead of the process environment.
    pub fn with_lookup(
        sources: Vec<CredentialSource>,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            sources,
            lookup: Box::new(lookup),
        }
    }

    pub fn sources(&self) -> &[CredentialSource] {
        &self.sources
    }
}

impl CredentialStore for EnvCredentialStore {
    fn credentials(&self) -> CredentialMap {
        let mut map = CredentialMap::new();
        for source in &self.sources {
            let key = (self.lookup)(&source.env_var)
                .and_then(Credential::new)
                .or_else(|| source.configured.clone().and_then(Credential::new));
            match key {
                Some(key) => map.insert(source.model.clone(), key),
                None => debug!("No API key for {} (set {})", source.model, source.env_var),
            }
        }
        map
    }
}
