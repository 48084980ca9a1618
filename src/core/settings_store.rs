use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use super::models::RuntimeSettings;

pub const VECTORIZER_PATH_ENV: &str = "CV_MATCH_VECTORIZER_PATH";
pub const PDFTOTEXT_PATH_ENV: &str = "CV_MATCH_PDFTOTEXT_PATH";

pub struct SettingsStore {
    file_path: PathBuf,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::new_with_path(settings_path())
    }

    pub fn new_with_path(file_path: PathBuf) -> Self {
        Self { file_path }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub async fn load(&self) -> anyhow::Result<RuntimeSettings> {
        if !tokio::fs::try_exists(&self.file_path)
            .await
            .unwrap_or(false)
        {
            debug!(path = %self.file_path.display(), "no settings file, using defaults");
            return Ok(RuntimeSettings::default());
        }

        let content = tokio::fs::read_to_string(&self.file_path)
            .await
            .with_context(|| {
                format!("failed to read settings file {}", self.file_path.display())
            })?;

        let parsed = serde_json::from_str::<RuntimeSettings>(&content).with_context(|| {
            format!("invalid JSON in settings file {}", self.file_path.display())
        })?;

        Ok(parsed)
    }

    pub async fn load_with_env(&self) -> anyhow::Result<RuntimeSettings> {
        let settings = self.load().await?;
        Ok(apply_env_overrides(settings, |key| std::env::var(key).ok()))
    }

    pub async fn save(&self, settings: &RuntimeSettings) -> anyhow::Result<()> {
        if let Some(parent) = self.file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(settings)?;
        tokio::fs::write(&self.file_path, json).await?;
        Ok(())
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_env_overrides(
    mut settings: RuntimeSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> RuntimeSettings {
    if let Some(path) = lookup(VECTORIZER_PATH_ENV).filter(|v| !v.trim().is_empty()) {
        settings.vectorizer_path = PathBuf::from(path);
    }
    if let Some(path) = lookup(PDFTOTEXT_PATH_ENV).filter(|v| !v.trim().is_empty()) {
        settings.pdftotext_path = path;
    }
    settings
}

fn settings_path() -> PathBuf {
    app_data_root().join("settings.json")
}

pub fn app_data_root() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(local_app_data) = std::env::var("LOCALAPPDATA") {
            return PathBuf::from(local_app_data).join("CvMatch");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = dirs::home_dir() {
            return home
                .join("Library")
                .join("Application Support")
                .join("CvMatch");
        }
    }

    if let Some(path) = dirs::data_local_dir() {
        return path.join("CvMatch");
    }

    PathBuf::from(".").join("CvMatch")
}
