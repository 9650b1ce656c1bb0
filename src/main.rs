use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use jamak::{Pipeline, config, output, server};

#[derive(Parser)]
#[command(name = "jamak")]
#[command(about = "Subtitle generation for online videos", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.jamak/config.yaml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP transcript service
    Serve {
        /// Port to listen on (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Transcribe a video URL or local media file to SRT
    Run {
        /// YouTube URL or path to a local audio/video file
        input: String,

        /// Spoken language (default: auto-detect)
        #[arg(short, long)]
        lang: Option<String>,

        /// Output SRT path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the transcript as JSON next to the SRT
        #[arg(long)]
        json: bool,
    },
}

static VIDEO_ID_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]v=([A-Za-z0-9_-]+)").expect("valid regex"));
static LAST_PATH_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/([A-Za-z0-9_-]+)/?(?:[?#].*)?$").expect("valid regex")
});

/// `<stem>.srt` in the current directory. URLs use the video id, or the last
/// path segment when there is no `v=` parameter.
fn default_output_path(input: &str, local: bool) -> PathBuf {
    let stem = if local {
        Path::new(input)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
    } else {
        VIDEO_ID_PARAM
            .captures(input)
            .or_else(|| LAST_PATH_SEGMENT.captures(input))
            .map(|c| c[1].to_string())
    };
    PathBuf::from(format!(
        "{}.srt",
        stem.unwrap_or_else(|| "transcript".to_string())
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut app_config =
        config::load_app_config(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                app_config.server.port = port;
            }
            server::serve(&app_config).await?;
        }
        Commands::Run {
            input,
            lang,
            output: output_path,
            json,
        } => {
            let pb = ProgressBar::new(1);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks",
                    )
                    .context("Invalid progress template")?
                    .progress_chars("#>-"),
            );
            pb.enable_steady_tick(Duration::from_millis(100));

            let pipeline = Pipeline::from_config(&app_config)
                .context("Failed to set up pipeline")?
                .with_progress(pb.clone());

            let is_local = Path::new(&input).exists();
            let transcript = if is_local {
                let path = Path::new(&input)
                    .canonicalize()
                    .context("Failed to find input file")?;
                pipeline.transcribe_file(&path, lang.as_deref()).await
            } else {
                pipeline.transcribe_url(&input, lang.as_deref()).await
            }
            .context("Transcription failed")?;

            pb.finish_with_message("Transcription complete");

            let srt_path = output_path.unwrap_or_else(|| default_output_path(&input, is_local));
            output::save_srt(&srt_path, &transcript)?;
            log::info!("saved SRT to {:?}", srt_path);

            if json {
                let json_path = srt_path.with_extension("transcript.json");
                output::save_transcript_json(&json_path, &transcript)?;
                log::info!("saved transcript to {:?}", json_path);
            }
        }
    }

    Ok(())
}
