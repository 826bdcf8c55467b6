use crate::config::toml_config::{DEFAULT_IMAGE, DEFAULT_SITE_URL};
use crate::config::RelayConfig;
use crate::domain::model::{
    ActionRow, Button, Embed, EmbedField, EmbedFooter, EmbedImage, Script, ScriptPost,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

pub const COPY_BUTTON_PREFIX: &str = "copy:";
pub const COPY_REPLY_LIMIT: usize = 1950;
const DATE_FORMAT: &str = "%b %d, %Y • %I:%M %p";

const COMPONENT_ACTION_ROW: u8 = 1;
const COMPONENT_BUTTON: u8 = 2;
const BUTTON_STYLE_SUCCESS: u8 = 3;

/// Formats a feed timestamp as e.g. `Mar 14, 2025 • 09:05 AM`.
///
/// RFC 3339 timestamps keep their own offset; naive ones are printed as-is
/// and a bare date is taken as midnight. Anything unparseable renders as
/// `Unknown`.
pub fn format_date(ts: Option<&str>) -> String {
    let Some(ts) = ts.filter(|t| !t.trim().is_empty()) else {
        return "Unknown".to_string();
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return dt.format(DATE_FORMAT).to_string();
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(ts, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(ts, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|dt| dt.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Builds the ephemeral reply for the copy button, truncating long sources.
pub fn copy_reply(code: &str) -> String {
    if code.chars().count() > COPY_REPLY_LIMIT {
        let head: String = code.chars().take(COPY_REPLY_LIMIT).collect();
        format!("```lua\n{}\n```\n*(Script truncated)*", head)
    } else {
        format!("```lua\n{}\n```", code)
    }
}

pub fn copy_button_id(script_id: &str) -> String {
    format!("{}{}", COPY_BUTTON_PREFIX, script_id)
}

#[derive(Debug, Clone)]
pub struct EmbedRenderer {
    site_url: String,
    default_image: String,
    color: u32,
    with_copy_button: bool,
}

impl EmbedRenderer {
    pub fn new(site_url: &str, default_image: &str, color: u32, with_copy_button: bool) -> Self {
        Self {
            site_url: site_url.trim_end_matches('/').to_string(),
            default_image: default_image.to_string(),
            color,
            with_copy_button,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(
            config.site_url(),
            config.default_image(),
            config.embed_color(),
            config.interactions_enabled(),
        )
    }

    pub fn image_url(&self, script: &Script) -> String {
        let image = script
            .game
            .as_ref()
            .and_then(|g| g.image_url.as_deref())
            .unwrap_or("");

        if image.is_empty() {
            self.default_image.clone()
        } else if image.starts_with('/') {
            format!("{}{}", self.site_url, image)
        } else {
            image.to_string()
        }
    }

    pub fn render(&self, script: &Script) -> ScriptPost {
        let game = script.game_name();
        let image = self.image_url(script);

        let embed = Embed {
            title: format!("🎮 {} 🎮", game),
            description: script.title_or_default().to_string(),
            color: self.color,
            fields: vec![
                EmbedField {
                    name: "⌛ Created".to_string(),
                    value: format_date(script.created_at.as_deref()),
                    inline: true,
                },
                EmbedField {
                    name: "📜 Script".to_string(),
                    value: "⬇️ Click **Copy Script** below ⬇️".to_string(),
                    inline: false,
                },
            ],
            thumbnail: EmbedImage { url: image.clone() },
            footer: EmbedFooter {
                text: game.to_string(),
                icon_url: image,
            },
        };

        let components = match (&script.id, self.with_copy_button) {
            (Some(id), true) => vec![ActionRow {
                kind: COMPONENT_ACTION_ROW,
                components: vec![Button {
                    kind: COMPONENT_BUTTON,
                    style: BUTTON_STYLE_SUCCESS,
                    label: "📋 Copy Script".to_string(),
                    custom_id: copy_button_id(id),
                }],
            }],
            _ => Vec::new(),
        };

        ScriptPost {
            embeds: vec![embed],
            components,
        }
    }
}

impl Default for EmbedRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_SITE_URL, DEFAULT_IMAGE, 0xFF0000, false)
    }
}
