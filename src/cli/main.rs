//! Classification CLI tool
//!
//! Command-line front-end over the request orchestrator: classify an image
//! against an artifact directory, or inspect an artifact descriptor.

use crate::{
    artifact::ArtifactSpec,
    config::ServiceConfig,
    orchestrator::RequestOrchestrator,
    removal::FnRemover,
    tracing_config,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Waste-image classification CLI tool
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "sortium")]
pub struct Cli {
    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Classify an image against an artifact
    Classify {
        /// Input image file
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Artifact directory (model file + artifact.json)
        #[arg(short, long, value_name = "DIR")]
        model: PathBuf,

        /// String-encoded label list, e.g. "['battery', 'glass', 'paper']"
        #[arg(short, long)]
        labels: String,
    },

    /// Print an artifact descriptor as JSON
    Inspect {
        /// Artifact directory (model file + artifact.json)
        #[arg(value_name = "DIR")]
        model: PathBuf,
    },
}

/// CLI entry point
pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_config::init_cli_tracing(cli.verbose)?;

    match cli.command {
        Command::Classify {
            image,
            model,
            labels,
        } => classify(&image, &model, labels).await,
        Command::Inspect { model } => inspect(&model),
    }
}

async fn classify(image: &Path, model: &Path, labels: String) -> Result<()> {
    let bytes = std::fs::read(image)
        .with_context(|| format!("failed to read image '{}'", image.display()))?;
    let filename = image
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let config = ServiceConfig::builder().artifact_dir(model).build()?;
    let loader = Arc::new(crate::backends::TractLoader::new());

    // Background removal is not exercised by this subcommand.
    let remover = Arc::new(FnRemover::new(|img| img));
    let orchestrator = RequestOrchestrator::new(&config, loader, remover)?;

    let start = Instant::now();
    let result = orchestrator.classify(&filename, &bytes, &[labels]).await?;
    println!("label: {}", result.label);
    println!("confidence: {}%", result.confidence);
    tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "classification done");
    Ok(())
}

fn inspect(model: &Path) -> Result<()> {
    let spec = ArtifactSpec::from_dir(model)?;
    println!("{}", serde_json::to_string_pretty(&spec)?);
    Ok(())
}
