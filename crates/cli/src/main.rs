//! platescan CLI
//!
//! Command-line front end for the equipment nameplate/display OCR pipeline:
//! quality assessment, preprocessing variant dumps, the offline heuristic
//! pipeline, and the full orchestrated OCR flow.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ocr_core::preprocess::{self, PreprocessAttempt};
use std::path::{Path, PathBuf};
use vision_bridge::{CancelFlag, Engine, EngineConfig, VisionClient, VisionConfig};

#[derive(Parser)]
#[command(name = "platescan")]
#[command(about = "Equipment nameplate/display OCR pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score an image for brightness/contrast/sharpness before spending OCR attempts
    Assess {
        /// Input image file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Write every preprocessing variant of an image to a directory
    Preprocess {
        /// Input image file
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for the variant images
        #[arg(short, long)]
        output_dir: PathBuf,
    },

    /// Run the local heuristic pipeline only (no network)
    Recognize {
        /// Input image file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Full OCR: remote attempts with retry and backoff, local fallback
    Ocr {
        /// Input image file
        #[arg(short, long)]
        input: PathBuf,

        /// Vision API key; defaults to $VISION_API_KEY
        #[arg(long)]
        api_key: Option<String>,

        /// Override the annotate endpoint URL
        #[arg(long)]
        endpoint: Option<String>,

        /// Comma-separated language hints (default: ko,en)
        #[arg(long)]
        languages: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Assess { input } => {
            let bytes = read_input(&input)?;
            let report = ocr_core::quality::assess_bytes(&bytes);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Preprocess { input, output_dir } => {
            let written = write_variants(&input, &output_dir)?;
            for path in written {
                println!("wrote {}", path.display());
            }
        }
        Commands::Recognize { input } => {
            let bytes = read_input(&input)?;
            let outcome = ocr_core::local::recognize_local_bytes(&bytes);
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Ocr {
            input,
            api_key,
            endpoint,
            languages,
        } => {
            let bytes = read_input(&input)?;

            let mut engine_config = EngineConfig::default();
            if let Some(langs) = languages {
                engine_config.language_hints =
                    langs.split(',').map(|s| s.trim().to_string()).collect();
            }

            let key = api_key.or_else(|| std::env::var("VISION_API_KEY").ok());
            let remote = match key {
                Some(key) => {
                    let mut config = VisionConfig::with_api_key(key);
                    if let Some(endpoint) = endpoint {
                        config.endpoint = endpoint;
                    }
                    Some(VisionClient::new(config).context("failed to build vision client")?)
                }
                None => {
                    tracing::warn!("no API key provided, running local pipeline only");
                    None
                }
            };

            let engine = Engine::new(remote, engine_config);
            let run = engine.run(&bytes, &CancelFlag::new()).await;
            println!("{}", serde_json::to_string_pretty(&run)?);
        }
    }

    Ok(())
}

fn read_input(input: &Path) -> Result<Vec<u8>> {
    std::fs::read(input).with_context(|| format!("failed to read {}", input.display()))
}

/// Decode the input once and save every preprocessing variant as PNG.
fn write_variants(input: &Path, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let bytes = read_input(input)?;
    let image = image::load_from_memory(&bytes).context("failed to decode input image")?;
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let mut written = Vec::new();
    for (i, attempt) in PreprocessAttempt::ALL.iter().enumerate() {
        let variant = preprocess::preprocess(&image, *attempt);
        let path = output_dir.join(format!("attempt-{}-{}.png", i + 1, attempt.label()));
        variant
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}
