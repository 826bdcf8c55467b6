use crate::core::code_cache::ScriptCodeCache;
use crate::core::embed::EmbedRenderer;
use crate::core::filter::ScriptFilter;
use crate::core::shutdown::ShutdownState;
use crate::core::{PostedStore, Publisher, ScriptSource};
use crate::domain::model::{BotUser, CycleOutcome, CycleReport};
use crate::utils::error::Result;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Releases the cycle flag however the cycle ends.
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct RelayEngine<S: ScriptSource, P: Publisher, T: PostedStore> {
    source: S,
    publisher: P,
    store: T,
    filter: ScriptFilter,
    renderer: EmbedRenderer,
    cache: ScriptCodeCache,
    posted: Mutex<BTreeSet<String>>,
    running: AtomicBool,
    shutdown: Arc<ShutdownState>,
    check_interval: Duration,
    post_delay: Duration,
}

impl<S: ScriptSource, P: Publisher, T: PostedStore> RelayEngine<S, P, T> {
    pub fn new(source: S, publisher: P, store: T) -> Self {
        Self {
            source,
            publisher,
            store,
            filter: ScriptFilter::default(),
            renderer: EmbedRenderer::default(),
            cache: ScriptCodeCache::default(),
            posted: Mutex::new(BTreeSet::new()),
            running: AtomicBool::new(false),
            shutdown: ShutdownState::new(),
            check_interval: Duration::from_secs(10),
            post_delay: Duration::from_secs(1),
        }
    }

    pub fn with_filter(mut self, filter: ScriptFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_renderer(mut self, renderer: EmbedRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_cache(mut self, cache: ScriptCodeCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_shutdown(mut self, shutdown: Arc<ShutdownState>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_timing(mut self, check_interval: Duration, post_delay: Duration) -> Self {
        self.check_interval = check_interval;
        self.post_delay = post_delay;
        self
    }

    /// Verifies the bot token and loads the ids posted by earlier runs.
    pub async fn connect(&self) -> Result<BotUser> {
        let user = self.publisher.current_user().await?;
        tracing::info!("🟢 ONLINE → {}", user.username);

        let loaded = self.store.load().await?;
        tracing::info!("📂 Loaded {} stored script IDs", loaded.len());
        *self.posted.lock().await = loaded;

        Ok(user)
    }

    pub async fn posted_ids(&self) -> BTreeSet<String> {
        self.posted.lock().await.clone()
    }

    pub fn cache(&self) -> &ScriptCodeCache {
        &self.cache
    }

    /// One fetch-filter-publish pass. Never fails; problems are logged.
    pub async fn run_cycle(&self) -> CycleOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Previous cycle still running, skipping");
            return CycleOutcome::Skipped;
        }
        let _guard = CycleGuard(&self.running);

        match self.process_scripts().await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("❌ Cycle error: {} (Category: {:?})", e, e.category());
                CycleOutcome::Aborted
            }
        }
    }

    async fn process_scripts(&self) -> Result<CycleOutcome> {
        if !self.publisher.channel_exists().await? {
            tracing::error!("❌ Channel not found");
            return Ok(CycleOutcome::ChannelMissing);
        }

        let scripts = match self.source.fetch_scripts().await {
            Ok(scripts) => scripts,
            Err(e) => {
                tracing::error!("❌ API FAILED after retries: {}", e);
                Vec::new()
            }
        };

        let mut report = CycleReport {
            fetched: scripts.len(),
            ..Default::default()
        };
        tracing::debug!("Fetched {} scripts", scripts.len());

        for script in scripts {
            if self.shutdown.is_shutting_down() {
                tracing::info!("Shutdown requested, ending cycle early");
                break;
            }

            let Some(id) = script.id.as_deref().filter(|id| !id.is_empty()) else {
                continue;
            };

            if self.posted.lock().await.contains(id) {
                report.skipped_seen += 1;
                continue;
            }

            if self.filter.is_broken(&script) {
                tracing::info!("⏭️ Skipping broken script {}", id);
                report.skipped_broken += 1;
                continue;
            }

            let post = self.renderer.render(&script);
            match self.publisher.publish(&post).await {
                Ok(()) => {
                    self.cache.insert(id, script.code());
                    self.remember(id).await;
                    report.posted += 1;
                    tracing::info!("📤 Posted {}", script.title.as_deref().unwrap_or(""));
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!("❌ Failed to send embed for {}: {}", id, e);
                }
            }

            self.pause(self.post_delay).await;
        }

        tracing::debug!(
            "Cycle done: fetched={} posted={} seen={} broken={} failed={}",
            report.fetched,
            report.posted,
            report.skipped_seen,
            report.skipped_broken,
            report.failed
        );
        Ok(CycleOutcome::Completed(report))
    }

    /// Records `id` and persists the whole set. A failed save is only logged.
    async fn remember(&self, id: &str) {
        let snapshot = {
            let mut posted = self.posted.lock().await;
            posted.insert(id.to_string());
            posted.clone()
        };

        if let Err(e) = self.store.save(&snapshot).await {
            tracing::error!("❌ Failed to save posted ids: {}", e);
        }
    }

    /// Sleeps for `duration` unless shutdown starts first.
    async fn pause(&self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {},
            _ = self.shutdown.wait() => {},
        }
    }

    pub async fn run(&self) {
        tracing::info!(
            "🚀 Bot started, checking every {}s",
            self.check_interval.as_secs()
        );

        while !self.shutdown.is_shutting_down() {
            self.run_cycle().await;
            self.pause(self.check_interval).await;
        }

        tracing::info!("👋 Relay loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Script, ScriptPost};
    use crate::utils::error::RelayError;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Clone, Default)]
    struct MockSource {
        scripts: Vec<Script>,
        fail: bool,
    }

    #[async_trait]
    impl ScriptSource for MockSource {
        async fn fetch_scripts(&self) -> Result<Vec<Script>> {
            if self.fail {
                return Err(RelayError::RetriesExhausted { attempts: 3 });
            }
            Ok(self.scripts.clone())
        }
    }

    #[derive(Clone, Default)]
    struct MockPublisher {
        sent: Arc<StdMutex<Vec<ScriptPost>>>,
        missing_channel: bool,
        reject_titles: Vec<String>,
        publish_delay: Duration,
    }

    impl MockPublisher {
        fn sent(&self) -> Vec<ScriptPost> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Publisher for MockPublisher {
        async fn current_user(&self) -> Result<BotUser> {
            Ok(BotUser {
                id: "1".to_string(),
                username: "relay-bot".to_string(),
            })
        }

        async fn channel_exists(&self) -> Result<bool> {
            Ok(!self.missing_channel)
        }

        async fn publish(&self, post: &ScriptPost) -> Result<()> {
            tokio::time::sleep(self.publish_delay).await;
            if self.reject_titles.contains(&post.embeds[0].description) {
                return Err(RelayError::DiscordApiError {
                    status: 403,
                    message: "Missing Permissions".to_string(),
                });
            }
            self.sent.lock().unwrap().push(post.clone());
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct MockStore {
        initial: BTreeSet<String>,
        saved: Arc<StdMutex<Vec<BTreeSet<String>>>>,
    }

    impl PostedStore for MockStore {
        async fn load(&self) -> Result<BTreeSet<String>> {
            Ok(self.initial.clone())
        }

        async fn save(&self, ids: &BTreeSet<String>) -> Result<()> {
            self.saved.lock().unwrap().push(ids.clone());
            Ok(())
        }
    }

    fn script(id: Option<&str>, title: &str, code: &str) -> Script {
        Script {
            id: id.map(str::to_string),
            title: Some(title.to_string()),
            script: Some(code.to_string()),
            ..Default::default()
        }
    }

    fn engine(
        source: MockSource,
        publisher: MockPublisher,
        store: MockStore,
    ) -> RelayEngine<MockSource, MockPublisher, MockStore> {
        RelayEngine::new(source, publisher, store)
            .with_timing(Duration::from_millis(10), Duration::ZERO)
    }

    #[tokio::test]
    async fn test_posts_only_new_valid_scripts() {
        let source = MockSource {
            scripts: vec![
                script(Some("a"), "Fresh", "print('fresh script')"),
                script(Some("b"), "Seen", "print('already posted')"),
                script(Some("c"), "Broken", "error('x')"),
                script(None, "No id", "print('orphan')"),
            ],
            ..Default::default()
        };
        let publisher = MockPublisher::default();
        let store = MockStore {
            initial: ["b".to_string()].into_iter().collect(),
            ..Default::default()
        };

        let relay = engine(source, publisher.clone(), store.clone());
        relay.connect().await.unwrap();

        let outcome = relay.run_cycle().await;
        assert_eq!(
            outcome,
            CycleOutcome::Completed(CycleReport {
                fetched: 4,
                posted: 1,
                skipped_seen: 1,
                skipped_broken: 1,
                failed: 0,
            })
        );

        let sent = publisher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].embeds[0].description, "Fresh");

        let saved = store.saved.lock().unwrap().clone();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].contains("a") && saved[0].contains("b"));
        assert_eq!(relay.cache().get("a").as_deref(), Some("print('fresh script')"));
    }

    #[tokio::test]
    async fn test_second_cycle_does_not_repost() {
        let source = MockSource {
            scripts: vec![script(Some("a"), "Fresh", "print('fresh script')")],
            ..Default::default()
        };
        let publisher = MockPublisher::default();
        let relay = engine(source, publisher.clone(), MockStore::default());

        relay.run_cycle().await;
        relay.run_cycle().await;

        assert_eq!(publisher.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_publish_is_not_remembered() {
        let source = MockSource {
            scripts: vec![
                script(Some("a"), "Rejected", "print('one')"),
                script(Some("b"), "Accepted", "print('two')"),
            ],
            ..Default::default()
        };
        let publisher = MockPublisher {
            reject_titles: vec!["Rejected".to_string()],
            ..Default::default()
        };
        let store = MockStore::default();
        let relay = engine(source, publisher.clone(), store.clone());

        let outcome = relay.run_cycle().await;
        let CycleOutcome::Completed(report) = outcome else {
            panic!("unexpected outcome {:?}", outcome);
        };
        assert_eq!(report.failed, 1);
        assert_eq!(report.posted, 1);

        let posted = relay.posted_ids().await;
        assert!(!posted.contains("a"));
        assert!(posted.contains("b"));
    }

    #[tokio::test]
    async fn test_missing_channel_posts_nothing() {
        let source = MockSource {
            scripts: vec![script(Some("a"), "Fresh", "print('fresh script')")],
            ..Default::default()
        };
        let publisher = MockPublisher {
            missing_channel: true,
            ..Default::default()
        };
        let relay = engine(source, publisher.clone(), MockStore::default());

        assert_eq!(relay.run_cycle().await, CycleOutcome::ChannelMissing);
        assert!(publisher.sent().is_empty());
    }

    #[tokio::test]
    async fn test_feed_failure_is_an_empty_cycle() {
        let source = MockSource {
            fail: true,
            ..Default::default()
        };
        let relay = engine(source, MockPublisher::default(), MockStore::default());

        assert_eq!(
            relay.run_cycle().await,
            CycleOutcome::Completed(CycleReport::default())
        );
    }

    #[tokio::test]
    async fn test_overlapping_cycle_is_skipped() {
        let source = MockSource {
            scripts: vec![script(Some("a"), "Slow", "print('slow script')")],
            ..Default::default()
        };
        let publisher = MockPublisher {
            publish_delay: Duration::from_millis(100),
            ..Default::default()
        };
        let relay = engine(source, publisher.clone(), MockStore::default());

        let (first, second) = tokio::join!(relay.run_cycle(), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            relay.run_cycle().await
        });

        assert!(matches!(first, CycleOutcome::Completed(_)));
        assert_eq!(second, CycleOutcome::Skipped);
        assert_eq!(publisher.sent().len(), 1);

        // the guard is released afterwards
        assert!(matches!(relay.run_cycle().await, CycleOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let shutdown = ShutdownState::new();
        let relay = engine(
            MockSource::default(),
            MockPublisher::default(),
            MockStore::default(),
        )
        .with_shutdown(shutdown.clone());

        let stopper = async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            shutdown.begin();
        };

        tokio::time::timeout(Duration::from_secs(1), async {
            tokio::join!(relay.run(), stopper);
        })
        .await
        .unwrap();
    }
}
