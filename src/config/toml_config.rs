use crate::utils::error::{RelayError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_DISCORD_API: &str = "https://discord.com/api/v10";
pub const DEFAULT_API_URL: &str = "https://scriptblox.com/api/script/fetch";
pub const DEFAULT_SITE_URL: &str = "https://scriptblox.com";
pub const DEFAULT_IMAGE: &str = "https://cdn.discordapp.com/attachments/920731720645500978/1350138518608937081/6794d187-3c79-4a3c-83bb-c9d08e768fa1.webp";
pub const MAX_RETRY_BACKOFF_MS: u64 = 600_000;
pub const DEFAULT_BANNED_KEYWORDS: [&str; 5] = ["error", "nil", "invalid", "fail", "patched"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub relay: RelaySettings,
    #[serde(default)]
    pub interactions: InteractionsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub token: Option<String>,
    #[serde(default, deserialize_with = "deserialize_snowflake")]
    pub channel_id: Option<String>,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    pub api_url: Option<String>,
    pub site_url: Option<String>,
    pub default_image: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelaySettings {
    pub check_interval_seconds: Option<u64>,
    pub post_delay_ms: Option<u64>,
    pub posted_file: Option<String>,
    pub min_script_length: Option<usize>,
    pub banned_keywords: Option<Vec<String>>,
    pub embed_color: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionsConfig {
    pub enabled: Option<bool>,
    pub bind: Option<String>,
    pub public_key: Option<String>,
}

/// Channel ids may be written as TOML integers or strings.
fn deserialize_snowflake<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Snowflake {
        Int(u64),
        Str(String),
    }

    Ok(Option::<Snowflake>::deserialize(deserializer)?.map(|s| match s {
        Snowflake::Int(n) => n.to_string(),
        Snowflake::Str(s) => s,
    }))
}

impl RelayConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Loads `path` when it exists, otherwise starts from defaults.
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(
                "Config file {} not found, using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);
        Ok(toml::from_str(&processed_content)?)
    }

    /// Replaces `${VAR}` with the environment value, leaving unknown names as-is.
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::LazyLock;

        static ENV_VAR: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex"));

        ENV_VAR
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    /// Environment variables win over the file.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| lookup(*k).filter(|v| !v.trim().is_empty()))
        };

        if let Some(token) = first(&["DISCORD_TOKEN", "TOKEN"]) {
            self.discord.token = Some(token);
        }
        if let Some(channel_id) = first(&["DISCORD_CHANNEL_ID", "CHANNEL_ID"]) {
            self.discord.channel_id = Some(channel_id);
        }
        if let Some(public_key) = first(&["DISCORD_PUBLIC_KEY"]) {
            self.interactions.public_key = Some(public_key);
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        let token = validation::validate_required_field("discord.token", &self.discord.token)?;
        validation::validate_non_empty_string("discord.token", token)?;

        let channel_id =
            validation::validate_required_field("discord.channel_id", &self.discord.channel_id)?;
        validation::validate_snowflake("discord.channel_id", channel_id)?;

        validation::validate_url("discord.api_base", self.discord_api_base())?;
        validation::validate_url("source.api_url", self.api_url())?;
        validation::validate_url("source.site_url", self.site_url())?;
        validation::validate_url("source.default_image", self.default_image())?;

        validation::validate_positive_number(
            "relay.check_interval_seconds",
            self.check_interval().as_secs(),
            1,
        )?;
        validation::validate_positive_number("source.timeout_seconds", self.timeout().as_secs(), 1)?;
        validation::validate_positive_number("source.max_retries", self.max_retries() as u64, 1)?;
        validation::validate_path("relay.posted_file", self.posted_file())?;

        if let Some(backoff) = self.source.retry_backoff_ms {
            if backoff > MAX_RETRY_BACKOFF_MS {
                return Err(RelayError::InvalidConfigValueError {
                    field: "source.retry_backoff_ms".to_string(),
                    value: backoff.to_string(),
                    reason: format!("Value must be at most {}", MAX_RETRY_BACKOFF_MS),
                });
            }
        }

        if let Some(color) = self.relay.embed_color {
            if color > 0xFF_FFFF {
                return Err(RelayError::InvalidConfigValueError {
                    field: "relay.embed_color".to_string(),
                    value: color.to_string(),
                    reason: "Colour must fit in 24 bits".to_string(),
                });
            }
        }

        if self.interactions_enabled() {
            let key = validation::validate_required_field(
                "interactions.public_key",
                &self.interactions.public_key,
            )?;
            validation::validate_hex_key("interactions.public_key", key, 32)?;
            self.interactions_bind()
                .parse::<std::net::SocketAddr>()
                .map_err(|e| RelayError::InvalidConfigValueError {
                    field: "interactions.bind".to_string(),
                    value: self.interactions_bind().to_string(),
                    reason: e.to_string(),
                })?;
        }

        Ok(())
    }

    pub fn token(&self) -> &str {
        self.discord.token.as_deref().unwrap_or("")
    }

    pub fn channel_id(&self) -> &str {
        self.discord.channel_id.as_deref().unwrap_or("")
    }

    pub fn discord_api_base(&self) -> &str {
        self.discord.api_base.as_deref().unwrap_or(DEFAULT_DISCORD_API)
    }

    pub fn api_url(&self) -> &str {
        self.source.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    pub fn site_url(&self) -> &str {
        self.source.site_url.as_deref().unwrap_or(DEFAULT_SITE_URL)
    }

    pub fn default_image(&self) -> &str {
        self.source.default_image.as_deref().unwrap_or(DEFAULT_IMAGE)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.source.timeout_seconds.unwrap_or(15))
    }

    pub fn max_retries(&self) -> u32 {
        self.source.max_retries.unwrap_or(3)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.source.retry_backoff_ms.unwrap_or(1000))
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.relay.check_interval_seconds.unwrap_or(10))
    }

    pub fn post_delay(&self) -> Duration {
        Duration::from_millis(self.relay.post_delay_ms.unwrap_or(1000))
    }

    pub fn posted_file(&self) -> &str {
        self.relay.posted_file.as_deref().unwrap_or("posted.json")
    }

    pub fn min_script_length(&self) -> usize {
        self.relay.min_script_length.unwrap_or(5)
    }

    pub fn banned_keywords(&self) -> Vec<String> {
        match &self.relay.banned_keywords {
            Some(words) => words.iter().map(|w| w.to_lowercase()).collect(),
            None => DEFAULT_BANNED_KEYWORDS.iter().map(|w| w.to_string()).collect(),
        }
    }

    pub fn embed_color(&self) -> u32 {
        self.relay.embed_color.unwrap_or(0xFF0000)
    }

    pub fn interactions_enabled(&self) -> bool {
        self.interactions.enabled.unwrap_or(false)
    }

    pub fn interactions_bind(&self) -> &str {
        self.interactions.bind.as_deref().unwrap_or("0.0.0.0:8080")
    }
}

impl Validate for RelayConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
