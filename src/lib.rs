//! Subtitles for online videos: download the audio track, transcribe it in
//! bounded chunks and merge the results into one SRT document.

pub mod chunker;
pub mod config;
pub mod download;
pub mod error;
pub mod ffmpeg;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod server;
pub mod transcribe;

pub use error::{Error, Result};
pub use pipeline::Pipeline;
pub use transcribe::{RawSegment, Segment, Transcript};
