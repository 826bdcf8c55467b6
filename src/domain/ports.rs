use crate::domain::model::{BotUser, Script, ScriptPost};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;

#[async_trait]
pub trait ScriptSource: Send + Sync {
    async fn fetch_scripts(&self) -> Result<Vec<Script>>;
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn current_user(&self) -> Result<BotUser>;
    async fn channel_exists(&self) -> Result<bool>;
    async fn publish(&self, post: &ScriptPost) -> Result<()>;
}

pub trait PostedStore: Send + Sync {
    fn load(&self) -> impl std::future::Future<Output = Result<BTreeSet<String>>> + Send;
    fn save(
        &self,
        ids: &BTreeSet<String>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
