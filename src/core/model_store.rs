use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::sync::Mutex;
use tracing::debug;

use super::vectorizer::{TfidfVectorizer, VectorizerArtifact};

pub struct JsonVectorizerStore {
    path: PathBuf,
    mutex: Mutex<()>,
}

impl JsonVectorizerStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            mutex: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn save(&self, vectorizer: &TfidfVectorizer) -> anyhow::Result<()> {
        let _lock = self.mutex.lock().await;
        let artifact = vectorizer.to_artifact()?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(&artifact)?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("failed writing {}", self.path.display()))?;
        debug!(path = %self.path.display(), terms = artifact.terms.len(), "vectorizer saved");
        Ok(())
    }

    /// `Ok(None)` when nothing has been persisted yet.
    pub async fn load(&self) -> anyhow::Result<Option<TfidfVectorizer>> {
        let _lock = self.mutex.lock().await;
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(None);
        }

        let json = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed reading {}", self.path.display()))?;
        let artifact = serde_json::from_str::<VectorizerArtifact>(&json)
            .with_context(|| format!("invalid vectorizer file {}", self.path.display()))?;
        let vectorizer = TfidfVectorizer::from_artifact(artifact)?;
        Ok(Some(vectorizer))
    }
}
