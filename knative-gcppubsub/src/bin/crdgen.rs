use clap::Parser;
use knative_gcppubsub::crd::{self, ManifestFormat};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Prints the GcpPubSubSource CustomResourceDefinition.
#[derive(Parser, Debug)]
#[command(name = "crdgen", version, about)]
struct Args {
    /// Manifest format.
    #[arg(long, value_enum, default_value_t = ManifestFormat::Yaml)]
    format: ManifestFormat,
    /// Write the manifest to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> knative_gcppubsub::Result<()> {
    // stdout carries the manifest
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.output {
        Some(path) => crd::write(args.format, &path)?,
        None => print!("{}", crd::render(args.format)?),
    }
    Ok(())
}
