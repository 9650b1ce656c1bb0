use crate::transcribe::Transcript;
use anyhow::Result;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const MILLIS_EPSILON: f64 = 1e-6;

pub fn save_transcript_json(path: &Path, transcript: &Transcript) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, transcript.segments())?;
    Ok(())
}

pub fn save_srt(path: &Path, transcript: &Transcript) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(format_srt(transcript).as_bytes())?;
    Ok(())
}

/// Renders `transcript` as SRT: 1-indexed blocks separated by a blank line.
/// An empty transcript renders to an empty string.
pub fn format_srt(transcript: &Transcript) -> String {
    transcript
        .segments()
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            format!(
                "{}\n{} --> {}\n{}\n",
                i + 1,
                format_timestamp(segment.start),
                format_timestamp(segment.end),
                segment.text.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `HH:MM:SS,mmm`, truncated to the millisecond.
pub fn format_timestamp(seconds: f64) -> String {
    // Offset sums such as 1200.0 + 0.3 land a hair below the exact millisecond.
    let total_ms = (seconds.max(0.0) * 1000.0 + MILLIS_EPSILON).floor() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}
