use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Failed to persist file: {0}")]
    PersistError(#[from] tempfile::PersistError),

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Discord API returned {status}: {message}")]
    DiscordApiError { status: u16, message: String },

    #[error("Script feed unavailable after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Signature verification failed: {message}")]
    SignatureError { message: String },

    #[error("Invalid interaction: {message}")]
    InteractionError { message: String },
}

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Storage,
    Discord,
    Security,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RelayError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RelayError::HttpError(_) | RelayError::RetriesExhausted { .. } => ErrorCategory::Network,
            RelayError::TomlError(_)
            | RelayError::MissingConfigError { .. }
            | RelayError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            RelayError::IoError(_)
            | RelayError::SerializationError(_)
            | RelayError::PersistError(_) => ErrorCategory::Storage,
            RelayError::DiscordApiError { .. } => ErrorCategory::Discord,
            RelayError::SignatureError { .. } | RelayError::InteractionError { .. } => {
                ErrorCategory::Security
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RelayError::SignatureError { .. } | RelayError::InteractionError { .. } => {
                ErrorSeverity::Low
            }
            RelayError::HttpError(_) | RelayError::RetriesExhausted { .. } => ErrorSeverity::Medium,
            RelayError::DiscordApiError { status, .. } if *status == 401 || *status == 403 => {
                ErrorSeverity::High
            }
            RelayError::DiscordApiError { .. } => ErrorSeverity::Medium,
            RelayError::TomlError(_)
            | RelayError::MissingConfigError { .. }
            | RelayError::InvalidConfigValueError { .. } => ErrorSeverity::High,
            RelayError::IoError(_)
            | RelayError::SerializationError(_)
            | RelayError::PersistError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            RelayError::MissingConfigError { field } if field == "discord.token" => {
                "TOKEN missing".to_string()
            }
            RelayError::MissingConfigError { field } if field == "discord.channel_id" => {
                "CHANNEL_ID missing".to_string()
            }
            RelayError::MissingConfigError { field } => format!("Missing setting: {}", field),
            RelayError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid setting {}: {}", field, reason)
            }
            RelayError::DiscordApiError { status: 401, .. } => {
                "Discord rejected the bot token".to_string()
            }
            RelayError::DiscordApiError { status, message } => {
                format!("Discord request failed ({}): {}", status, message)
            }
            RelayError::RetriesExhausted { .. } => "ScriptBlox API is unreachable".to_string(),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check network connectivity and the source.api_url setting",
            ErrorCategory::Configuration => {
                "Set DISCORD_TOKEN and DISCORD_CHANNEL_ID or fix the TOML configuration file"
            }
            ErrorCategory::Storage => "Check that the posted ids file location is writable",
            ErrorCategory::Discord => {
                "Verify the bot token and that the bot can view and post in the channel"
            }
            ErrorCategory::Security => "Verify interactions.public_key matches the Discord application",
        }
    }
}
