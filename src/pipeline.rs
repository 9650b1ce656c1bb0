use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

use crate::chunker::{AudioAsset, AudioChunker};
use crate::config::AppConfig;
use crate::download::{Downloader, YtDlp, validate_url};
use crate::error::{Error, Result};
use crate::transcribe::openai::OpenAiTranscriber;
use crate::transcribe::orchestrator::Orchestrator;
use crate::transcribe::{Transcript, TranscriptionService};

/// Scratch directory for one request. Removed when dropped.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn create(request_id: &Uuid) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("jamak-{}-", request_id))
            .tempdir()?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Download → chunk → transcribe → merge, all-or-nothing per request.
pub struct Pipeline {
    downloader: Arc<dyn Downloader>,
    service: Option<Arc<dyn TranscriptionService>>,
    chunker: AudioChunker,
    download_timeout: Duration,
    concurrency: usize,
    progress: Option<ProgressBar>,
}

impl Pipeline {
    /// `service: None` means provider credentials are missing; every
    /// request then fails with [`Error::Config`].
    pub fn new(
        downloader: Arc<dyn Downloader>,
        service: Option<Arc<dyn TranscriptionService>>,
        chunker: AudioChunker,
        download_timeout: Duration,
    ) -> Self {
        Self {
            downloader,
            service,
            chunker,
            download_timeout,
            concurrency: 1,
            progress: None,
        }
    }

    pub fn from_config(conf: &AppConfig) -> Result<Self> {
        let service: Option<Arc<dyn TranscriptionService>> =
            match OpenAiTranscriber::new(&conf.transcription) {
                Ok(client) => Some(Arc::new(client)),
                Err(Error::Config(message)) => {
                    log::warn!("{}; transcription requests will fail", message);
                    None
                }
                Err(e) => return Err(e),
            };

        Ok(Self::new(
            Arc::new(YtDlp::new(&conf.download)),
            service,
            AudioChunker::from_config(&conf.pipeline),
            conf.download.timeout(),
        )
        .with_concurrency(conf.pipeline.chunk_concurrency))
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_progress(mut self, pb: ProgressBar) -> Self {
        self.progress = Some(pb);
        self
    }

    fn service(&self) -> Result<Arc<dyn TranscriptionService>> {
        self.service
            .clone()
            .ok_or_else(|| Error::Config("OpenAI API key not configured".to_string()))
    }

    pub async fn transcribe_url(&self, url: &str, language: Option<&str>) -> Result<Transcript> {
        let service = self.service()?;
        validate_url(url)?;

        let request_id = Uuid::new_v4();
        let workspace = Workspace::create(&request_id)?;
        log::info!("[{}] downloading audio for {}", request_id, url.trim());

        let fetch = self.downloader.fetch(url.trim(), workspace.path());
        let asset = match tokio::time::timeout(self.download_timeout, fetch).await {
            Ok(result) => result?,
            Err(_) => {
                log::warn!(
                    "[{}] download exceeded {}s",
                    request_id,
                    self.download_timeout.as_secs()
                );
                return Err(Error::DownloadTimeout(self.download_timeout.as_secs()));
            }
        };
        log::info!(
            "[{}] downloaded {:.1}s of audio ({} bytes)",
            request_id,
            asset.duration.as_secs_f64(),
            asset.size
        );

        self.transcribe_asset(&request_id, service, &asset, workspace.path(), language)
            .await
    }

    /// Transcribes a local media file. The file itself is never removed.
    pub async fn transcribe_file(&self, path: &Path, language: Option<&str>) -> Result<Transcript> {
        let service = self.service()?;
        let request_id = Uuid::new_v4();
        let workspace = Workspace::create(&request_id)?;

        let source: PathBuf = path.to_path_buf();
        let asset = tokio::task::spawn_blocking(move || AudioAsset::probe(source))
            .await
            .map_err(|e| Error::Internal(format!("probe task failed: {}", e)))??;

        self.transcribe_asset(&request_id, service, &asset, workspace.path(), language)
            .await
    }

    async fn transcribe_asset(
        &self,
        request_id: &Uuid,
        service: Arc<dyn TranscriptionService>,
        asset: &AudioAsset,
        workspace: &Path,
        language: Option<&str>,
    ) -> Result<Transcript> {
        let chunks = self.chunker.chunk(asset, workspace).await?;
        log::info!("[{}] transcribing {} chunk(s)", request_id, chunks.len());

        let mut orchestrator = Orchestrator::new(service)
            .with_concurrency(self.concurrency)
            .with_request_id(*request_id);
        if let Some(pb) = &self.progress {
            pb.set_length(chunks.len() as u64);
            orchestrator = orchestrator.with_progress(pb.clone());
        }

        let transcript = orchestrator.transcribe(&chunks, language).await?;
        log::info!("[{}] transcript has {} segment(s)", request_id, transcript.len());
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::Chunk;
    use crate::transcribe::{RawSegment, ServiceOutput};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Writes a placeholder file and reports the given duration.
    struct FakeDownloader {
        duration: Duration,
        delay: Duration,
        seen_workspace: Mutex<Option<PathBuf>>,
    }

    impl FakeDownloader {
        fn new(duration: Duration) -> Self {
            Self {
                duration,
                delay: Duration::ZERO,
                seen_workspace: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Downloader for FakeDownloader {
        async fn fetch(&self, _url: &str, workspace: &Path) -> Result<AudioAsset> {
            *self.seen_workspace.lock().unwrap() = Some(workspace.to_path_buf());
            tokio::time::sleep(self.delay).await;
            let path = workspace.join("audio.m4a");
            std::fs::write(&path, b"fake")?;
            Ok(AudioAsset {
                path,
                duration: self.duration,
                size: 4,
            })
        }
    }

    struct EchoService;

    #[async_trait]
    impl TranscriptionService for EchoService {
        async fn transcribe(&self, chunk: &Chunk, _language: Option<&str>) -> Result<ServiceOutput> {
            assert!(chunk.path.exists());
            Ok(ServiceOutput::StructuredSegments(vec![RawSegment::new(
                0.5, 1.5, "hello",
            )]))
        }
    }

    fn pipeline(downloader: Arc<FakeDownloader>, timeout: Duration) -> Pipeline {
        Pipeline::new(
            downloader,
            Some(Arc::new(EchoService)),
            AudioChunker::new(Duration::from_secs(1200)),
            timeout,
        )
    }

    #[tokio::test]
    async fn url_runs_end_to_end_and_cleans_workspace() {
        let downloader = Arc::new(FakeDownloader::new(Duration::from_secs(30)));
        let transcript = pipeline(downloader.clone(), Duration::from_secs(5))
            .transcribe_url("https://youtu.be/abc", None)
            .await
            .unwrap();

        assert_eq!(transcript.len(), 1);
        let workspace = downloader.seen_workspace.lock().unwrap().clone().unwrap();
        assert!(!workspace.exists());
    }

    #[tokio::test]
    async fn slow_download_times_out_and_cleans_workspace() {
        let mut slow = FakeDownloader::new(Duration::from_secs(30));
        slow.delay = Duration::from_millis(500);
        let downloader = Arc::new(slow);

        let err = pipeline(downloader.clone(), Duration::from_millis(20))
            .transcribe_url("https://youtu.be/abc", None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DownloadTimeout(_)));
        let workspace = downloader.seen_workspace.lock().unwrap().clone().unwrap();
        assert!(!workspace.exists());
    }

    #[tokio::test]
    async fn zero_duration_yields_empty_transcript() {
        let downloader = Arc::new(FakeDownloader::new(Duration::ZERO));
        let transcript = pipeline(downloader, Duration::from_secs(5))
            .transcribe_url("https://www.youtube.com/watch?v=x", None)
            .await
            .unwrap();
        assert!(transcript.is_empty());
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_download() {
        let downloader = Arc::new(FakeDownloader::new(Duration::from_secs(1)));
        let pipeline = Pipeline::new(
            downloader.clone(),
            None,
            AudioChunker::new(Duration::from_secs(1200)),
            Duration::from_secs(5),
        );
        let err = pipeline
            .transcribe_url("https://youtu.be/abc", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(downloader.seen_workspace.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn unsupported_url_is_rejected_before_download() {
        let downloader = Arc::new(FakeDownloader::new(Duration::from_secs(1)));
        let err = pipeline(downloader.clone(), Duration::from_secs(5))
            .transcribe_url("https://vimeo.com/1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(downloader.seen_workspace.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_url_run_is_spawnable() {
        let downloader = Arc::new(FakeDownloader::new(Duration::from_secs(30)));
        let pipeline = Arc::new(pipeline(downloader, Duration::from_secs(5)).with_concurrency(3));
        let handle = tokio::spawn(async move {
            pipeline
                .transcribe_url("https://youtu.be/abc", Some("en"))
                .await
        });
        let transcript = handle.await.unwrap().unwrap();
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn workspace_is_removed_on_drop() {
        let workspace = Workspace::create(&Uuid::new_v4()).unwrap();
        let path = workspace.path().to_path_buf();
        std::fs::write(path.join("audio.m4a"), b"x").unwrap();
        assert!(path.exists());
        drop(workspace);
        assert!(!path.exists());
    }
}
