use ffmpeg_sidecar::child::FfmpegChild;
use ffmpeg_sidecar::command::FfmpegCommand;
use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const CHUNK_SAMPLE_RATE: &str = "16000";

/// Output of `ffprobe -show_entries format=duration`, in seconds.
pub fn parse_probe_output(stdout: &str) -> Result<Duration> {
    let value = stdout.trim();
    let seconds: f64 = value
        .parse()
        .map_err(|_| Error::ChunkingFailure(format!("unreadable duration {:?}", value)))?;
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| Error::ChunkingFailure(format!("invalid duration {}: {}", seconds, e)))
}

pub fn probe_duration(path: &Path) -> Result<Duration> {
    let output = Command::new(ffmpeg_sidecar::ffprobe::ffprobe_path())
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| Error::ChunkingFailure(format!("unable to run ffprobe: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::ChunkingFailure(format!(
            "ffprobe could not read {}: {}",
            path.display(),
            stderr.trim()
        )));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

/// Re-encodes `[offset, offset + duration)` of `input` to mono MP3.
/// `duration: None` encodes to the end of the input.
pub fn encode_window(
    input: &Path,
    output: &Path,
    offset: Duration,
    duration: Option<Duration>,
    bitrate: &str,
    timeout: Duration,
) -> Result<()> {
    let input_str = input
        .to_str()
        .ok_or_else(|| Error::ChunkingFailure("invalid input path".to_string()))?;
    let output_str = output
        .to_str()
        .ok_or_else(|| Error::ChunkingFailure("invalid output path".to_string()))?;

    let mut command = FfmpegCommand::new();
    command
        .hide_banner()
        .args(["-nostdin", "-loglevel", "error"])
        .args(["-ss", &seconds_arg(offset)])
        .input(input_str);
    if let Some(duration) = duration {
        command.args(["-t", &seconds_arg(duration)]);
    }
    command
        .args(["-vn", "-ac", "1", "-ar", CHUNK_SAMPLE_RATE])
        .args(["-codec:a", "libmp3lame", "-b:a", bitrate])
        .overwrite()
        .output(output_str);

    let mut child = command
        .spawn()
        .map_err(|e| Error::ChunkingFailure(format!("unable to run ffmpeg: {}", e)))?;

    let status = wait_with_deadline(&mut child, timeout)?;
    if status.success() {
        Ok(())
    } else {
        let mut stderr = String::new();
        if let Some(mut pipe) = child.take_stderr() {
            let _ = pipe.read_to_string(&mut stderr);
        }
        Err(Error::ChunkingFailure(format!(
            "ffmpeg exited with {}: {}",
            status,
            stderr.trim()
        )))
    }
}

fn wait_with_deadline(child: &mut FfmpegChild, timeout: Duration) -> Result<ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.as_inner_mut().try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::ChunkingFailure(format!(
                "ffmpeg did not finish within {} seconds",
                timeout.as_secs()
            )));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn seconds_arg(duration: Duration) -> String {
    format!("{}.{:03}", duration.as_secs(), duration.subsec_millis())
}
