use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};

use storycraft::{
    backend::GeminiClient,
    config::Config,
    pipeline::StoryEngine,
    scene::{AspectRatio, StoryDraft},
};

#[derive(Parser)]
#[command(
    name = "storycraft",
    version,
    about = "Turn a story draft into illustrated scenes, bundles and videos",
    long_about = "Storycraft decomposes a short story draft into ordered scenes, \
                  generates an image for each scene, and assembles the results into \
                  a downloadable ZIP bundle or a compiled video."
)]
struct Cli {
    /// File containing the story draft text
    #[arg(short, long)]
    draft: PathBuf,

    /// Number of scenes to aim for (the backend may return fewer)
    #[arg(short, long, default_value_t = 6)]
    scenes: usize,

    /// Image aspect ratio (9:16, 16:9, 1:1)
    #[arg(short, long, default_value = "16:9")]
    ratio: String,

    /// Write a ZIP bundle of prompts and images to this path
    #[arg(short, long)]
    bundle: Option<PathBuf>,

    /// Compile a video of all renderable scenes to this path
    #[arg(short = 'o', long)]
    video: Option<PathBuf>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .init();

    info!("Starting Storycraft v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = match cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(&config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };
    config.validate()?;

    let aspect_ratio = AspectRatio::parse(&cli.ratio)
        .ok_or_else(|| anyhow::anyhow!("Unknown aspect ratio: {}", cli.ratio))?;

    let draft_text = tokio::fs::read_to_string(&cli.draft).await?;
    let mut draft = StoryDraft::new(draft_text, cli.scenes);
    draft.aspect_ratio = aspect_ratio;

    // One client serves both capabilities
    let client = Arc::new(GeminiClient::from_config(&config.backend)?);
    let mut engine = StoryEngine::new(config, client.clone(), client);

    let count = engine.decompose_draft(&draft).await?;
    info!("Draft decomposed into {} scenes", count);

    engine.generate_images().await?;

    if let Some(bundle_path) = &cli.bundle {
        let artifact = engine.export_bundle(bundle_path).await?;
        info!("Bundle saved to {:?} ({} entries)", artifact.path, artifact.entry_count);
    }

    if let Some(video_path) = &cli.video {
        let artifact = engine.compile_video(video_path).await?;
        info!(
            "Video saved to {:?} ({} segments, {:.1} MB)",
            artifact.path,
            artifact.segment_count,
            artifact.file_size as f64 / 1024.0 / 1024.0
        );
    }

    if cli.bundle.is_none() && cli.video.is_none() {
        info!("No output requested; pass --bundle or --video to save results");
    }

    Ok(())
}
