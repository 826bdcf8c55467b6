use crate::config::RelayConfig;
use crate::core::{Publisher, ScriptPost};
use crate::domain::model::BotUser;
use crate::utils::error::{RelayError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Discord refuses to wait longer than this for us anyway.
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct RateLimited {
    retry_after: f64,
}

/// Converts Discord's `retry_after` seconds into a bounded wait.
fn rate_limit_wait(retry_after: f64) -> Duration {
    Duration::try_from_secs_f64(retry_after.max(0.0))
        .unwrap_or(MAX_RATE_LIMIT_WAIT)
        .min(MAX_RATE_LIMIT_WAIT)
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// Talks to the Discord REST API with a bot token.
pub struct DiscordClient {
    client: Client,
    api_base: String,
    channel_id: String,
}

impl DiscordClient {
    pub fn new(api_base: &str, token: &str, channel_id: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bot {}", token)).map_err(|e| {
            RelayError::InvalidConfigValueError {
                field: "discord.token".to_string(),
                value: "<redacted>".to_string(),
                reason: e.to_string(),
            }
        })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .user_agent(concat!(
                "DiscordBot (https://scriptblox.com, ",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            channel_id: channel_id.to_string(),
        })
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        Self::new(
            config.discord_api_base(),
            config.token(),
            config.channel_id(),
            config.timeout(),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn api_error(response: Response) -> RelayError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|b| b.message)
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or(text);
        RelayError::DiscordApiError { status, message }
    }

    async fn send_message(&self, post: &ScriptPost) -> Result<Response> {
        let url = self.url(&format!("/channels/{}/messages", self.channel_id));
        Ok(self.client.post(url).json(post).send().await?)
    }
}

#[async_trait]
impl Publisher for DiscordClient {
    async fn current_user(&self) -> Result<BotUser> {
        let response = self.client.get(self.url("/users/@me")).send().await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(response.json().await?)
    }

    async fn channel_exists(&self) -> Result<bool> {
        let url = self.url(&format!("/channels/{}", self.channel_id));
        let response = self.client.get(url).send().await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => Ok(false),
            _ => Err(Self::api_error(response).await),
        }
    }

    /// Honours one 429 `retry_after` before giving up.
    async fn publish(&self, post: &ScriptPost) -> Result<()> {
        let mut response = self.send_message(post).await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let wait = response
                .json::<RateLimited>()
                .await
                .map(|r| rate_limit_wait(r.retry_after))
                .unwrap_or(Duration::from_secs(1));
            tracing::warn!("⏳ Rate limited by Discord, retrying in {:?}", wait);
            tokio::time::sleep(wait).await;
            response = self.send_message(post).await?;
        }

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::api_error(response).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::embed::EmbedRenderer;
    use crate::domain::model::Script;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> DiscordClient {
        DiscordClient::new(&server.base_url(), "secret", "42", Duration::from_secs(5)).unwrap()
    }

    fn post() -> ScriptPost {
        EmbedRenderer::default().render(&Script {
            id: Some("abc".to_string()),
            title: Some("Hub".to_string()),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_current_user() {
        let server = MockServer::start();
        let me = server.mock(|when, then| {
            when.method(GET)
                .path("/users/@me")
                .header("authorization", "Bot secret");
            then.status(200)
                .json_body(serde_json::json!({"id": "9", "username": "relay-bot"}));
        });

        let user = client(&server).current_user().await.unwrap();
        me.assert();
        assert_eq!(user.username, "relay-bot");
    }

    #[tokio::test]
    async fn test_bad_token_is_api_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/users/@me");
            then.status(401)
                .json_body(serde_json::json!({"message": "401: Unauthorized", "code": 0}));
        });

        let err = client(&server).current_user().await.unwrap_err();
        assert!(matches!(
            err,
            RelayError::DiscordApiError { status: 401, ref message } if message == "401: Unauthorized"
        ));
    }

    #[tokio::test]
    async fn test_channel_exists() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/channels/42");
            then.status(404).json_body(serde_json::json!({"message": "Unknown Channel"}));
        });

        assert!(!client(&server).channel_exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_publish_sends_embed() {
        let server = MockServer::start();
        let send = server.mock(|when, then| {
            when.method(POST)
                .path("/channels/42/messages")
                .header("authorization", "Bot secret")
                .body_contains(r#""description":"Hub""#)
                .body_contains(r#""color":16711680"#);
            then.status(200).json_body(serde_json::json!({"id": "1"}));
        });

        client(&server).publish(&post()).await.unwrap();
        send.assert();
    }

    #[tokio::test]
    async fn test_publish_failure_carries_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/channels/42/messages");
            then.status(403)
                .json_body(serde_json::json!({"message": "Missing Permissions", "code": 50013}));
        });

        let err = client(&server).publish(&post()).await.unwrap_err();
        assert!(matches!(err, RelayError::DiscordApiError { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_channel_probe_error_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/channels/42");
            then.status(500).json_body(serde_json::json!({"message": "Internal"}));
        });

        let err = client(&server).channel_exists().await.unwrap_err();
        assert!(matches!(err, RelayError::DiscordApiError { status: 500, .. }));
    }

    #[test]
    fn test_rate_limit_wait_is_bounded() {
        assert_eq!(rate_limit_wait(0.25), Duration::from_millis(250));
        assert_eq!(rate_limit_wait(-3.0), Duration::ZERO);
        assert_eq!(rate_limit_wait(1e300), MAX_RATE_LIMIT_WAIT);
        assert_eq!(rate_limit_wait(f64::INFINITY), MAX_RATE_LIMIT_WAIT);
        assert_eq!(rate_limit_wait(45.0), MAX_RATE_LIMIT_WAIT);
    }

    #[tokio::test]
    async fn test_rate_limited_twice_gives_up() {
        let server = MockServer::start();
        let limited = server.mock(|when, then| {
            when.method(POST).path("/channels/42/messages");
            then.status(429).json_body(serde_json::json!({
                "message": "You are being rate limited.",
                "retry_after": 0.01,
                "global": false
            }));
        });

        let err = client(&server).publish(&post()).await.unwrap_err();
        limited.assert_hits(2);
        assert!(matches!(err, RelayError::DiscordApiError { status: 429, .. }));
    }

    #[tokio::test]
    async fn test_rate_limit_retry_succeeds() {
        use axum::http::StatusCode as AxumStatus;
        use axum::routing::post as axum_post;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = axum::Router::new().route(
            "/channels/42/messages",
            axum_post(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        (
                            AxumStatus::TOO_MANY_REQUESTS,
                            axum::Json(serde_json::json!({"retry_after": 0.01})),
                        )
                    } else {
                        (AxumStatus::OK, axum::Json(serde_json::json!({"id": "1"})))
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = DiscordClient::new(
            &format!("http://{}", addr),
            "secret",
            "42",
            Duration::from_secs(5),
        )
        .unwrap();

        client.publish(&post()).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
