use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::ffmpeg;

/// A local, fully written audio file owned by one request.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioAsset {
    pub path: PathBuf,
    pub duration: Duration,
    pub size: u64,
}

impl AudioAsset {
    /// Probes duration and size of an existing file.
    pub fn probe(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let size = std::fs::metadata(&path)?.len();
        let duration = ffmpeg::probe_duration(&path)?;
        Ok(Self {
            path,
            duration,
            size,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub index: usize,
    pub path: PathBuf,
    pub start_offset: Duration,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub index: usize,
    pub offset: Duration,
    pub duration: Duration,
}

/// Splits `total` into consecutive windows of at most `limit`.
///
/// Windows are contiguous from zero and their durations sum to `total`.
/// The last window holds the remainder and is never empty, except for a
/// zero-length input which yields one zero-length window.
pub fn plan_windows(total: Duration, limit: Duration) -> Result<Vec<Window>> {
    if limit.is_zero() {
        return Err(Error::ChunkingFailure(
            "chunk limit must be greater than zero".to_string(),
        ));
    }

    if total <= limit {
        return Ok(vec![Window {
            index: 0,
            offset: Duration::ZERO,
            duration: total,
        }]);
    }

    let mut windows = Vec::new();
    let mut offset = Duration::ZERO;
    while offset < total {
        let duration = limit.min(total - offset);
        windows.push(Window {
            index: windows.len(),
            offset,
            duration,
        });
        offset += duration;
    }
    Ok(windows)
}

pub struct AudioChunker {
    limit: Duration,
    max_upload_bytes: u64,
    bitrate: String,
    encode_timeout: Duration,
}

impl AudioChunker {
    pub fn new(limit: Duration) -> Self {
        let defaults = PipelineConfig::default();
        Self {
            limit,
            max_upload_bytes: defaults.max_upload_bytes,
            encode_timeout: defaults.encode_timeout(),
            bitrate: defaults.chunk_bitrate,
        }
    }

    pub fn from_config(conf: &PipelineConfig) -> Self {
        Self {
            limit: conf.chunk_limit(),
            max_upload_bytes: conf.max_upload_bytes,
            bitrate: conf.chunk_bitrate.clone(),
            encode_timeout: conf.encode_timeout(),
        }
    }

    /// Produces the ordered chunks for `asset`, writing any re-encoded
    /// chunk files into `workspace`.
    pub async fn chunk(&self, asset: &AudioAsset, workspace: &Path) -> Result<Vec<Chunk>> {
        let windows = plan_windows(asset.duration, self.limit)?;

        let passthrough = windows.len() == 1
            && (asset.duration.is_zero() || asset.size <= self.max_upload_bytes);
        if passthrough {
            log::debug!(
                "single chunk passthrough for {} ({:.1}s, {} bytes)",
                asset.path.display(),
                asset.duration.as_secs_f64(),
                asset.size
            );
            return Ok(vec![Chunk {
                index: 0,
                path: asset.path.clone(),
                start_offset: Duration::ZERO,
                duration: asset.duration,
            }]);
        }

        log::info!(
            "splitting {:.1}s of audio into {} chunk(s) of at most {}s",
            asset.duration.as_secs_f64(),
            windows.len(),
            self.limit.as_secs()
        );

        let last_index = windows.len() - 1;
        let mut chunks = Vec::with_capacity(windows.len());
        for window in windows {
            let output = workspace.join(format!("chunk-{}.mp3", window.index));
            // The final window runs to end of input so container rounding
            // cannot drop trailing audio.
            let length = (window.index != last_index).then_some(window.duration);

            let input = asset.path.clone();
            let target = output.clone();
            let bitrate = self.bitrate.clone();
            let timeout = self.encode_timeout;
            tokio::task::spawn_blocking(move || {
                ffmpeg::encode_window(&input, &target, window.offset, length, &bitrate, timeout)
            })
            .await
            .map_err(|e| Error::Internal(format!("chunk encoder task failed: {}", e)))??;

            chunks.push(Chunk {
                index: window.index,
                path: output,
                start_offset: window.offset,
                duration: window.duration,
            });
        }

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn assert_covers(windows: &[Window], total: Duration) {
        let mut expected_offset = Duration::ZERO;
        for (i, w) in windows.iter().enumerate() {
            assert_eq!(w.index, i);
            assert_eq!(w.offset, expected_offset);
            expected_offset += w.duration;
        }
        assert_eq!(expected_offset, total);
        let sum: Duration = windows.iter().map(|w| w.duration).sum();
        assert_eq!(sum, total);
    }

    #[test]
    fn short_audio_is_one_window() {
        let windows = plan_windows(secs(300), secs(1200)).unwrap();
        assert_eq!(
            windows,
            vec![Window {
                index: 0,
                offset: Duration::ZERO,
                duration: secs(300)
            }]
        );
    }

    #[test]
    fn audio_equal_to_limit_is_one_window() {
        let windows = plan_windows(secs(1200), secs(1200)).unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].duration, secs(1200));
    }

    #[test]
    fn long_audio_keeps_remainder_last() {
        let total = Duration::from_millis(2_750_500);
        let windows = plan_windows(total, secs(1200)).unwrap();
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].duration, secs(1200));
        assert_eq!(windows[1].duration, secs(1200));
        assert_eq!(windows[2].duration, Duration::from_millis(350_500));
        assert_covers(&windows, total);
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let windows = plan_windows(secs(3600), secs(1200)).unwrap();
        assert_eq!(windows.len(), 3);
        assert!(windows.iter().all(|w| w.duration == secs(1200)));
        assert_covers(&windows, secs(3600));
    }

    #[test]
    fn coverage_holds_for_many_sizes() {
        for total_ms in [1u64, 999, 1000, 1001, 59_999, 60_000, 123_456, 7_200_001] {
            for limit_s in [1u64, 7, 60, 1200] {
                let total = Duration::from_millis(total_ms);
                let windows = plan_windows(total, secs(limit_s)).unwrap();
                assert_covers(&windows, total);
                assert!(windows.iter().all(|w| !w.duration.is_zero()));
                assert!(windows.iter().all(|w| w.duration <= secs(limit_s)));
            }
        }
    }

    #[test]
    fn zero_duration_is_one_degenerate_window() {
        let windows = plan_windows(Duration::ZERO, secs(1200)).unwrap();
        assert_eq!(windows.len(), 1);
        assert!(windows[0].duration.is_zero());
    }

    #[test]
    fn zero_limit_is_rejected() {
        assert!(matches!(
            plan_windows(secs(10), Duration::ZERO),
            Err(Error::ChunkingFailure(_))
        ));
    }

    #[tokio::test]
    async fn small_asset_passes_through_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let asset = AudioAsset {
            path: dir.path().join("audio.m4a"),
            duration: secs(90),
            size: 1024,
        };
        let chunks = AudioChunker::new(secs(1200))
            .chunk(&asset, dir.path())
            .await
            .unwrap();
        assert_eq!(
            chunks,
            vec![Chunk {
                index: 0,
                path: asset.path.clone(),
                start_offset: Duration::ZERO,
                duration: secs(90),
            }]
        );
    }

    #[tokio::test]
    async fn empty_asset_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let asset = AudioAsset {
            path: dir.path().join("audio.webm"),
            duration: Duration::ZERO,
            size: u64::MAX,
        };
        let chunks = AudioChunker::new(secs(1200))
            .chunk(&asset, dir.path())
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].duration.is_zero());
    }

    #[test]
    fn new_takes_pipeline_defaults() {
        let defaults = PipelineConfig::default();
        let chunker = AudioChunker::new(secs(30));
        assert_eq!(chunker.limit, secs(30));
        assert_eq!(chunker.max_upload_bytes, defaults.max_upload_bytes);
        assert_eq!(chunker.bitrate, defaults.chunk_bitrate);
        assert_eq!(chunker.encode_timeout, defaults.encode_timeout());
    }

    #[tokio::test]
    async fn undecodable_long_asset_is_chunking_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.m4a");
        std::fs::write(&path, b"definitely not audio").unwrap();
        let asset = AudioAsset {
            path,
            duration: secs(2500),
            size: 20,
        };

        let result = AudioChunker::new(secs(1200)).chunk(&asset, dir.path()).await;
        assert!(
            matches!(result, Err(Error::ChunkingFailure(_))),
            "got {:?}",
            result
        );
    }

    fn write_tone(path: &Path, seconds: u32) {
        let mut child = ffmpeg_sidecar::command::FfmpegCommand::new()
            .hide_banner()
            .args(["-nostdin", "-loglevel", "error", "-f", "lavfi", "-i"])
            .arg(format!("sine=frequency=440:duration={}", seconds))
            .args(["-ac", "1"])
            .overwrite()
            .output(path)
            .spawn()
            .unwrap();
        let status = child.wait().unwrap();
        assert!(status.success(), "ffmpeg could not generate test tone");
    }

    #[tokio::test]
    async fn long_asset_is_encoded_per_window() {
        if !ffmpeg_sidecar::command::ffmpeg_is_installed() {
            eprintln!("ffmpeg not installed, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("tone.wav");
        write_tone(&source, 5);
        let asset = AudioAsset {
            size: std::fs::metadata(&source).unwrap().len(),
            path: source,
            duration: secs(5),
        };

        let chunks = AudioChunker::new(secs(2))
            .chunk(&asset, dir.path())
            .await
            .unwrap();

        assert_eq!(chunks.len(), 3);
        let offsets: Vec<_> = chunks.iter().map(|c| c.start_offset).collect();
        assert_eq!(offsets, vec![secs(0), secs(2), secs(4)]);
        let durations: Vec<_> = chunks.iter().map(|c| c.duration).collect();
        assert_eq!(durations, vec![secs(2), secs(2), secs(1)]);
        for chunk in &chunks {
            assert_eq!(
                chunk.path,
                dir.path().join(format!("chunk-{}.mp3", chunk.index))
            );
            assert!(std::fs::metadata(&chunk.path).unwrap().len() > 0);
        }
    }

    #[tokio::test]
    async fn oversized_single_window_is_reencoded() {
        if !ffmpeg_sidecar::command::ffmpeg_is_installed() {
            eprintln!("ffmpeg not installed, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("tone.wav");
        write_tone(&source, 2);
        let asset = AudioAsset {
            size: std::fs::metadata(&source).unwrap().len(),
            path: source,
            duration: secs(2),
        };
        let chunker = AudioChunker {
            max_upload_bytes: 1,
            ..AudioChunker::new(secs(1200))
        };

        let chunks = chunker.chunk(&asset, dir.path()).await.unwrap();
        assert_eq!(
            chunks,
            vec![Chunk {
                index: 0,
                path: dir.path().join("chunk-0.mp3"),
                start_offset: Duration::ZERO,
                duration: secs(2),
            }]
        );
        assert!(chunks[0].path.exists());
    }
}
