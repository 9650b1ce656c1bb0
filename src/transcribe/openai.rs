use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;

use crate::chunker::Chunk;
use crate::config::TranscriptionConfig;
use crate::error::{Error, Result, truncate_detail};
use crate::transcribe::{RawSegment, ServiceOutput, TranscriptionService, normalize_language};

/// Client for an OpenAI-compatible `/v1/audio/transcriptions` endpoint.
pub struct OpenAiTranscriber {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Option<Vec<VerboseSegment>>,
}

#[derive(Debug, Deserialize)]
struct VerboseSegment {
    start: f64,
    end: f64,
    text: String,
}

impl OpenAiTranscriber {
    /// Fails with [`Error::Config`] when no credential is configured.
    pub fn new(conf: &TranscriptionConfig) -> Result<Self> {
        let api_key = conf
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("OpenAI API key not configured".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(conf.request_timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: conf.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: conf.model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/audio/transcriptions", self.base_url)
    }
}

/// Resolves a `verbose_json` body to structured segments, or to flat text
/// when the provider returned no timing.
pub fn parse_verbose_json(body: &str) -> Result<ServiceOutput> {
    let parsed: VerboseTranscription = serde_json::from_str(body).map_err(|e| {
        Error::ServiceFailure(format!("unexpected response body: {}", e))
    })?;

    match parsed.segments {
        Some(segments) if !segments.is_empty() => Ok(ServiceOutput::StructuredSegments(
            segments
                .into_iter()
                .map(|s| RawSegment::new(s.start, s.end, s.text))
                .collect(),
        )),
        _ => Ok(ServiceOutput::FlatText(parsed.text)),
    }
}

#[async_trait]
impl TranscriptionService for OpenAiTranscriber {
    async fn transcribe(&self, chunk: &Chunk, language: Option<&str>) -> Result<ServiceOutput> {
        let audio = tokio::fs::read(&chunk.path).await?;
        let file_name = chunk
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("chunk-{}.mp3", chunk.index));

        let mut form = Form::new()
            .part("file", Part::bytes(audio).file_name(file_name))
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");
        if let Some(language) = normalize_language(language) {
            form = form.text("language", language);
        }

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::ServiceFailure(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::ServiceFailure(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::ServiceFailure(format!(
                "{} {}",
                status,
                truncate_detail(body.trim())
            )));
        }

        parse_verbose_json(&body)
    }
}
