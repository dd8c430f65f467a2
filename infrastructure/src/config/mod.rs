//! Configuration file loading for thinking
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `THINKING_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./thinking.toml` or `./.thinking.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/thinking/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileBackendConfig, FileConfig, FileLanguageConfig,
    FileLanguagesConfig, FileModelConfig, FileModelsConfig, FileOutputConfig, FileOutputFormat,
    FileStreamingConfig, FileSummaryConfig,
};
pub use loader::ConfigLoader;
