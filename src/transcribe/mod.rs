pub mod openai;
pub mod orchestrator;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chunker::Chunk;
use crate::error::Result;

/// A timed utterance in chunk-local seconds, as returned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl RawSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// A segment on the whole-asset timeline, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Transcript {
    segments: Vec<Segment>,
}

impl Transcript {
    pub fn empty() -> Self {
        Self::default()
    }

    // Only the merger builds non-empty transcripts, after validating order.
    pub(crate) fn from_validated(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// What the service returned for one chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceOutput {
    StructuredSegments(Vec<RawSegment>),
    /// Text without timing; spans the whole chunk.
    FlatText(String),
}

/// Speech-to-text collaborator, called once per chunk.
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn transcribe(&self, chunk: &Chunk, language: Option<&str>) -> Result<ServiceOutput>;
}

#[async_trait]
impl<T: TranscriptionService + ?Sized> TranscriptionService for std::sync::Arc<T> {
    async fn transcribe(&self, chunk: &Chunk, language: Option<&str>) -> Result<ServiceOutput> {
        (**self).transcribe(chunk, language).await
    }
}

/// Normalizes a requested language: empty or `auto` means auto-detect.
pub fn normalize_language(language: Option<&str>) -> Option<String> {
    language
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case("auto"))
        .map(str::to_lowercase)
}
