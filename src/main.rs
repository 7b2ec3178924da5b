use anyhow::{Context, Result};
use clap::Parser;
use digest_pin::registry::{EnvCredentials, Resolver, ResolverConfig};
use digest_pin::{build_render_vars, failure_kind, load_images, write_render_vars, Settings};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pin container image tags to manifest digests and emit the template
/// variables for the operator manifests
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON file listing the images to resolve
    #[arg(long, env = "CONFIG_CONTAINER_IMAGES")]
    images: Option<PathBuf>,
    /// Controller manager image reference (e.g., quay.io/org/controller:v1.0)
    #[arg(long, env = "IMG")]
    controller_image: Option<String>,
    /// Operator version (defaults to 99.0.0)
    #[arg(long, env = "VERSION")]
    operator_version: Option<String>,
    /// Base directory for a relative --output path
    #[arg(long, env = "GITHUB_WORKSPACE")]
    workspace: Option<PathBuf>,
    /// Write the template variables as JSON to this file instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing; stdout is reserved for the variables
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        match failure_kind(&e) {
            Some(kind) => eprintln!("Error ({} error): {:#}", kind, e),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::new(
        cli.images,
        cli.controller_image,
        cli.operator_version,
        cli.workspace,
        cli.output,
    )?;

    let images = load_images(&settings.images_file)?;

    let credentials = Arc::new(EnvCredentials::from_env());
    let resolver = Resolver::new(ResolverConfig::default(), credentials)
        .context("Failed to create HTTP client")?;

    let vars = build_render_vars(&resolver, &images, &settings).await?;
    write_render_vars(&vars, settings.output_path().as_deref())
}
