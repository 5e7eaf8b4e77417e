use anyhow::{bail, Context, Result};
use std::path::PathBuf;

#[async_trait::async_trait]
pub trait FileStorage: Send + Sync {
    /// Persist `bytes` under `name` and return the stored identifier.
    async fn store(&self, name: &str, bytes: &[u8]) -> Result<String>;
}

/// Writes uploads into a local directory, which the router also serves.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

#[async_trait::async_trait]
impl FileStorage for LocalFileStorage {
    async fn store(&self, name: &str, bytes: &[u8]) -> Result<String> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            bail!("Invalid file name '{}'", name);
        }

        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create upload directory {}", self.root.display()))?;
        let path = self.root.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        log::info!("Stored upload {} ({} bytes)", name, bytes.len());
        Ok(name.to_string())
    }
}
