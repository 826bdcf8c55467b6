use crate::config::RelayConfig;
use clap::Parser;

pub const DEFAULT_CONFIG_PATH: &str = "relay.toml";

#[derive(Debug, Clone, Parser)]
#[command(name = "scriptblox-relay")]
#[command(about = "Relays newly published ScriptBlox scripts into a Discord channel")]
pub struct CliArgs {
    /// Path to the TOML configuration file [default: relay.toml]
    #[arg(short, long)]
    pub config: Option<String>,

    /// Discord bot token (overrides config and environment)
    #[arg(long)]
    pub token: Option<String>,

    /// Target channel id (overrides config and environment)
    #[arg(long)]
    pub channel_id: Option<String>,

    /// Seconds between feed checks
    #[arg(long)]
    pub interval: Option<u64>,

    /// Where posted script ids are remembered
    #[arg(long)]
    pub posted_file: Option<String>,

    /// Run a single cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliArgs {
    /// The default path may be absent; an explicit one must exist.
    pub fn config_is_explicit(&self) -> bool {
        self.config.is_some()
    }

    pub fn config_path(&self) -> &str {
        self.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH)
    }

    pub fn apply_to(&self, config: &mut RelayConfig) {
        if let Some(token) = &self.token {
            config.discord.token = Some(token.clone());
        }
        if let Some(channel_id) = &self.channel_id {
            config.discord.channel_id = Some(channel_id.clone());
        }
        if let Some(interval) = self.interval {
            config.relay.check_interval_seconds = Some(interval);
        }
        if let Some(posted_file) = &self.posted_file {
            config.relay.posted_file = Some(posted_file.clone());
        }
    }
}
