use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;

use crate::chunker::AudioAsset;
use crate::config::DownloadConfig;
use crate::error::{Error, Result};

/// m4a first, then webm, then any audio-only stream.
const AUDIO_FORMAT: &str = "bestaudio[ext=m4a]/bestaudio[ext=webm]/bestaudio";
const AUDIO_STEM: &str = "audio";

static SUPPORTED_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(https?://)?([a-z0-9-]+\.)*(youtube\.com|youtu\.be)([/?#:]|$)")
        .expect("host pattern is valid")
});

/// Only YouTube watch/short links are accepted.
pub fn validate_url(url: &str) -> Result<()> {
    if SUPPORTED_HOST.is_match(url.trim()) {
        Ok(())
    } else {
        Err(Error::Validation(
            "Only YouTube URLs are supported".to_string(),
        ))
    }
}

/// Fetches the audio track of a remote video into a request workspace.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn fetch(&self, url: &str, workspace: &Path) -> Result<AudioAsset>;
}

/// Runs `yt-dlp` as a subprocess. The child is killed if the future is dropped.
pub struct YtDlp {
    program: String,
}

impl YtDlp {
    pub fn new(conf: &DownloadConfig) -> Self {
        Self {
            program: conf.program.clone(),
        }
    }
}

#[async_trait]
impl Downloader for YtDlp {
    async fn fetch(&self, url: &str, workspace: &Path) -> Result<AudioAsset> {
        let template = workspace.join(format!("{}.%(ext)s", AUDIO_STEM));

        let output = tokio::process::Command::new(&self.program)
            .args(["--no-playlist", "--no-progress", "--quiet", "-f", AUDIO_FORMAT])
            .arg("-o")
            .arg(&template)
            .arg(url)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::DownloadFailure(format!("unable to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::DownloadFailure(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let path = find_audio_file(workspace)?.ok_or_else(|| {
            Error::DownloadFailure("audio file not found after download".to_string())
        })?;

        tokio::task::spawn_blocking(move || AudioAsset::probe(path))
            .await
            .map_err(|e| Error::Internal(format!("probe task failed: {}", e)))?
    }
}

/// Finds the completed `audio.<ext>` file, ignoring partial downloads.
fn find_audio_file(workspace: &Path) -> Result<Option<PathBuf>> {
    for entry in std::fs::read_dir(workspace)? {
        let path = entry?.path();
        let is_audio = path.file_stem().and_then(|s| s.to_str()) == Some(AUDIO_STEM);
        let partial = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "part" || e == "ytdl");
        if is_audio && !partial && path.is_file() {
            return Ok(Some(path));
        }
    }
    Ok(None)
}
