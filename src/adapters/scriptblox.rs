use crate::config::RelayConfig;
use crate::core::{Script, ScriptSource};
use crate::domain::model::FeedResponse;
use crate::utils::error::{RelayError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

pub struct ScriptBloxClient {
    client: Client,
    api_url: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl ScriptBloxClient {
    pub fn new(
        api_url: &str,
        timeout: Duration,
        max_retries: u32,
        retry_backoff: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("scriptblox-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            max_retries: max_retries.max(1),
            retry_backoff,
        })
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        Self::new(
            config.api_url(),
            config.timeout(),
            config.max_retries(),
            config.retry_backoff(),
        )
    }

    async fn fetch_once(&self) -> Result<Option<Vec<Script>>> {
        tracing::debug!("📡 Requesting {}", self.api_url);
        let response = self.client.get(&self.api_url).send().await?;

        if response.status() != StatusCode::OK {
            tracing::warn!("⚠️ API status {}", response.status().as_u16());
            return Ok(None);
        }

        let feed: FeedResponse = response.json().await?;
        Ok(Some(feed.into_scripts()))
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff.saturating_mul(attempt)
    }
}

#[async_trait]
impl ScriptSource for ScriptBloxClient {
    /// Waits `attempt × backoff` after each failed attempt.
    async fn fetch_scripts(&self) -> Result<Vec<Script>> {
        for attempt in 1..=self.max_retries {
            match self.fetch_once().await {
                Ok(Some(scripts)) => return Ok(scripts),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        "⚠️ API error attempt {}/{}: {}",
                        attempt,
                        self.max_retries,
                        e
                    );
                }
            }

            tokio::time::sleep(self.backoff_for(attempt)).await;
        }

        Err(RelayError::RetriesExhausted {
            attempts: self.max_retries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(url: String, retries: u32) -> ScriptBloxClient {
        ScriptBloxClient::new(&url, Duration::from_secs(5), retries, Duration::from_millis(1))
            .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_scripts_success() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/api/script/fetch");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({
                    "result": {
                        "totalPages": 1,
                        "scripts": [
                            {"_id": "1", "title": "One", "script": "print(1)"},
                            {"_id": "2", "title": "Two", "isPatched": true}
                        ]
                    }
                }));
        });

        let scripts = client(server.url("/api/script/fetch"), 3)
            .fetch_scripts()
            .await
            .unwrap();

        api_mock.assert();
        assert_eq!(scripts.len(), 2);
        assert_eq!(scripts[0].code(), "print(1)");
        assert!(scripts[1].is_patched);
    }

    #[tokio::test]
    async fn test_fetch_scripts_missing_result_is_empty() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(200).json_body(serde_json::json!({"message": "ok"}));
        });

        let scripts = client(server.url("/"), 1).fetch_scripts().await.unwrap();
        assert!(scripts.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_scripts_retries_on_bad_status() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(503);
        });

        let result = client(server.url("/"), 3).fetch_scripts().await;

        api_mock.assert_hits(3);
        assert!(matches!(
            result,
            Err(RelayError::RetriesExhausted { attempts: 3 })
        ));
    }

    #[tokio::test]
    async fn test_fetch_scripts_retries_on_invalid_json() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(200).body("<html>cloudflare</html>");
        });

        let result = client(server.url("/"), 2).fetch_scripts().await;

        api_mock.assert_hits(2);
        assert!(result.is_err());
    }

    #[test]
    fn test_backoff_grows_and_saturates() {
        let client = client("http://localhost/".to_string(), 3);
        assert_eq!(client.backoff_for(3), Duration::from_millis(3));

        let huge = ScriptBloxClient::new(
            "http://localhost/",
            Duration::from_secs(5),
            3,
            Duration::from_millis(u64::MAX),
        )
        .unwrap();
        assert_eq!(huge.backoff_for(3), Duration::MAX);
    }
}
