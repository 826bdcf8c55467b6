use crate::core::PostedStore;
use crate::utils::error::Result;
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Posted script ids kept as a pretty-printed JSON array on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(data: &[u8]) -> serde_json::Result<BTreeSet<String>> {
        let value: serde_json::Value = serde_json::from_slice(data)?;
        Ok(match value {
            serde_json::Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    serde_json::Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => BTreeSet::new(),
        })
    }

    fn encode(ids: &BTreeSet<String>) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        ids.serialize(&mut serializer)?;
        Ok(buf)
    }

    /// Writes to a temp file beside the target, then renames it into place.
    fn write_atomic(&self, data: &[u8]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        // NamedTempFile removes itself when dropped before persist.
        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(data)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path)?;
        Ok(())
    }
}

impl PostedStore for JsonFileStore {
    async fn load(&self) -> Result<BTreeSet<String>> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("{} not found, starting empty", self.path.display());
                return Ok(BTreeSet::new());
            }
            Err(e) => return Err(e.into()),
        };

        match Self::parse(&data) {
            Ok(ids) => Ok(ids),
            Err(e) => {
                tracing::warn!(
                    "⚠️ {} corrupted ({}), recreating",
                    self.path.display(),
                    e
                );
                let empty = BTreeSet::new();
                self.save(&empty).await?;
                Ok(empty)
            }
        }
    }

    async fn save(&self, ids: &BTreeSet<String>) -> Result<()> {
        let data = Self::encode(ids)?;
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.write_atomic(&data))
            .await
            .map_err(std::io::Error::other)?
    }
}
