use futures_util::{FutureExt, StreamExt, TryStreamExt, stream};
use indicatif::ProgressBar;
use std::sync::Arc;
use uuid::Uuid;

use crate::chunker::Chunk;
use crate::error::Result;
use crate::merge::{ChunkSegments, merge};
use crate::transcribe::{
    RawSegment, ServiceOutput, Transcript, TranscriptionService, normalize_language,
};

/// Drives one service call per chunk and merges the results.
///
/// With a concurrency of 1 chunks are submitted strictly in order. Higher
/// values submit up to that many at once; results are still merged in chunk
/// order, so the transcript is identical either way. The first failure
/// aborts the whole run.
pub struct Orchestrator {
    service: Arc<dyn TranscriptionService>,
    concurrency: usize,
    progress: Option<ProgressBar>,
    request_id: Uuid,
}

impl Orchestrator {
    pub fn new(service: Arc<dyn TranscriptionService>) -> Self {
        Self {
            service,
            concurrency: 1,
            progress: None,
            request_id: Uuid::new_v4(),
        }
    }

    /// Tags chunk log lines with the id of the request being served.
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_progress(mut self, pb: ProgressBar) -> Self {
        self.progress = Some(pb);
        self
    }

    pub async fn transcribe(&self, chunks: &[Chunk], language: Option<&str>) -> Result<Transcript> {
        if chunks.iter().all(|c| c.duration.is_zero()) {
            log::info!("[{}] no audio to transcribe", self.request_id);
            return Ok(Transcript::empty());
        }

        let language = normalize_language(language);
        let language = language.as_deref();

        let per_chunk: Vec<ChunkSegments> = if self.concurrency == 1 {
            let mut results = Vec::with_capacity(chunks.len());
            for chunk in chunks {
                results.push(self.transcribe_chunk(chunk, language).await?);
            }
            results
        } else {
            let pending: Vec<_> = chunks
                .iter()
                .map(|chunk| self.transcribe_chunk(chunk, language).boxed())
                .collect();
            stream::iter(pending)
                .buffered(self.concurrency)
                .try_collect()
                .await?
        };

        merge(per_chunk)
    }

    async fn transcribe_chunk(&self, chunk: &Chunk, language: Option<&str>) -> Result<ChunkSegments> {
        log::debug!(
            "[{}] submitting chunk {} (offset {:.1}s, {:.1}s)",
            self.request_id,
            chunk.index,
            chunk.start_offset.as_secs_f64(),
            chunk.duration.as_secs_f64()
        );

        let output = self
            .service
            .transcribe(chunk, language)
            .await
            .inspect_err(|e| {
                log::warn!("[{}] chunk {} failed: {}", self.request_id, chunk.index, e)
            })?;

        let segments = match output {
            ServiceOutput::StructuredSegments(segments) => segments,
            ServiceOutput::FlatText(text) if text.trim().is_empty() => Vec::new(),
            ServiceOutput::FlatText(text) => {
                log::debug!("[{}] chunk {} returned untimed text", self.request_id, chunk.index);
                vec![RawSegment::new(0.0, chunk.duration.as_secs_f64(), text)]
            }
        };

        log::debug!(
            "[{}] chunk {} yielded {} segment(s)",
            self.request_id,
            chunk.index,
            segments.len()
        );
        if let Some(pb) = &self.progress {
            pb.inc(1);
        }

        Ok(ChunkSegments {
            index: chunk.index,
            offset: chunk.start_offset.as_secs_f64(),
            segments,
        })
    }
}
