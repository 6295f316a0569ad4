//! CLI entry point for the persisted query manifest generator.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use persisted_query_manifest::collect_file_paths;
use persisted_query_manifest::generate_persisted_query_manifest;
use persisted_query_manifest::write_manifest;
use persisted_query_manifest::GenerateError;
use persisted_query_manifest::PersistedQueryManifestConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "generate-persisted-query-manifest",
    about = "Generate a persisted query manifest file",
    disable_version_flag = true
)]
struct Opt {
    /// Path to the config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the files matched from the documents pattern.
    #[arg(short, long)]
    list_files: bool,

    /// Output the version number.
    #[arg(short = 'v', long)]
    version: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let opt = Opt::parse();

    if opt.version {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let (config, config_path) = match &opt.config {
        Some(path) => (
            PersistedQueryManifestConfig::from_file(path)?,
            Some(path.clone()),
        ),
        None => {
            let current_dir = std::env::current_dir().context("could not determine working directory")?;
            match PersistedQueryManifestConfig::discover(&current_dir)? {
                Some((config, path)) => (config, Some(path)),
                None => (PersistedQueryManifestConfig::default(), None),
            }
        }
    };

    if opt.list_files {
        for path in collect_file_paths(&config.documents)? {
            println!("{}", path.display());
        }
        return Ok(());
    }

    match generate_persisted_query_manifest(&config, config_path.as_deref()).await {
        Ok(manifest) => {
            write_manifest(&manifest, &config.output).await?;
            println!(
                "Manifest written to {} with {} operations",
                config.output.display(),
                manifest.operations.len()
            );
            Ok(())
        }
        Err(GenerateError::Diagnostics { report }) => {
            eprintln!("{report}");
            std::process::exit(1);
        }
        Err(error) => Err(error.into()),
    }
}
