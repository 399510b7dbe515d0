//! Person Image Generation CLI Tool
//!
//! Command-line interface for virtual try-on and pose transfer using the
//! persongen library.

#[cfg(feature = "cli")]
use persongen::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
