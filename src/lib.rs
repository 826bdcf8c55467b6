pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliArgs;
pub use crate::config::RelayConfig;

pub use crate::adapters::{DiscordClient, JsonFileStore, ScriptBloxClient};
pub use crate::core::{code_cache::ScriptCodeCache, relay::RelayEngine, shutdown::ShutdownState};
pub use crate::utils::error::{RelayError, Result};
