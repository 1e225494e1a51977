//! Sortium CLI tool
//!
//! Command-line interface for classifying waste images with the sortium
//! library's lazy-loading inference pipeline.

#[cfg(feature = "cli")]
use sortium::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
