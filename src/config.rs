use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub transcription: TranscriptionConfig,
    pub pipeline: PipelineConfig,
    pub download: DownloadConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Inbound API key. Requests must send it as `x-api-key` when set.
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            api_key: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub request_timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            model: "whisper-1".to_string(),
            request_timeout_secs: 600,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    pub chunk_seconds: u64,
    pub max_upload_bytes: u64,
    pub chunk_bitrate: String,
    pub chunk_concurrency: usize,
    pub encode_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_seconds: 1200,
            max_upload_bytes: 25 * 1024 * 1024,
            chunk_bitrate: "64k".to_string(),
            chunk_concurrency: 1,
            encode_timeout_secs: 300,
        }
    }
}

impl PipelineConfig {
    pub fn chunk_limit(&self) -> Duration {
        Duration::from_secs(self.chunk_seconds)
    }

    pub fn encode_timeout(&self) -> Duration {
        Duration::from_secs(self.encode_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DownloadConfig {
    pub program: String,
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            program: "yt-dlp".to_string(),
            timeout_secs: 120,
        }
    }
}

impl DownloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Applies environment overrides on top of file values.
    ///
    /// - PORT, HOST → server
    /// - TRANSCRIPT_API_KEY → server.api_key (empty disables the check)
    /// - OPENAI_API_KEY, OPENAI_BASE_URL → transcription
    /// - JAMAK_CHUNK_SECONDS, JAMAK_CHUNK_CONCURRENCY → pipeline
    /// - JAMAK_DOWNLOAD_TIMEOUT_SECS → download.timeout_secs
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT is not a valid port: {:?}", port))?;
        }
        if let Some(host) = lookup("HOST").filter(|h| !h.trim().is_empty()) {
            self.server.host = host.trim().to_string();
        }
        if let Some(key) = lookup("TRANSCRIPT_API_KEY") {
            self.server.api_key = non_empty(key);
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.transcription.api_key = non_empty(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL").and_then(non_empty) {
            self.transcription.base_url = url;
        }
        if let Some(secs) = lookup("JAMAK_CHUNK_SECONDS") {
            self.pipeline.chunk_seconds = secs
                .trim()
                .parse()
                .with_context(|| format!("JAMAK_CHUNK_SECONDS is not a number: {:?}", secs))?;
        }
        if let Some(n) = lookup("JAMAK_CHUNK_CONCURRENCY") {
            self.pipeline.chunk_concurrency = n
                .trim()
                .parse()
                .with_context(|| format!("JAMAK_CHUNK_CONCURRENCY is not a number: {:?}", n))?;
        }
        if let Some(secs) = lookup("JAMAK_DOWNLOAD_TIMEOUT_SECS") {
            self.download.timeout_secs = secs.trim().parse().with_context(|| {
                format!("JAMAK_DOWNLOAD_TIMEOUT_SECS is not a number: {:?}", secs)
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.pipeline.chunk_seconds == 0 {
            anyhow::bail!("pipeline.chunk_seconds must be greater than zero");
        }
        if self.pipeline.chunk_concurrency == 0 {
            anyhow::bail!("pipeline.chunk_concurrency must be at least 1");
        }
        if self.download.timeout_secs == 0 {
            anyhow::bail!("download.timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".jamak/config.yaml"))
}

pub fn parse_app_config(content: &str) -> anyhow::Result<AppConfig> {
    if content.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    let config: AppConfig = serde_yaml::from_str(content)?;
    Ok(config)
}

/// Loads the config file (explicit path, or `~/.jamak/config.yaml` if present),
/// then layers process environment overrides on top.
pub fn load_app_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let mut config = match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found at {:?}", path);
            }
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {:?}", path))?;
            parse_app_config(&content)
                .with_context(|| format!("Failed to parse config {:?}", path))?
        }
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => {
                let content = std::fs::read_to_string(&path)?;
                parse_app_config(&content)
                    .with_context(|| format!("Failed to parse config {:?}", path))?
            }
            None => AppConfig::default(),
        },
    };

    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}
