//! fairdice API server binary

use clap::Parser;
use fairdice::api::ApiServer;
use fairdice::config::{ConfigLoader, StorageBackend};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fairdice-api")]
#[command(about = "Provably fair dice game API server", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// API server host
    #[arg(long)]
    host: Option<String>,

    /// API server port
    #[arg(long)]
    port: Option<u16>,

    /// Database directory for the rocks backend
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Storage backend: memory or rocks
    #[arg(long)]
    storage: Option<String>,

    /// Allowed CORS origins (comma-separated, use * for all)
    #[arg(long)]
    cors_origins: Option<String>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_path(path);
    }
    let mut config = loader.load()?;

    // Flags win over file and environment
    if let Some(host) = args.host {
        config.api.host = host;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(dir) = args.data_dir {
        config.storage.data_directory = dir;
    }
    if let Some(backend) = args.storage {
        config.storage.backend = match backend.as_str() {
            "memory" => StorageBackend::Memory,
            "rocks" => StorageBackend::Rocks,
            other => return Err(format!("--storage must be 'memory' or 'rocks', got '{}'", other).into()),
        };
    }
    if let Some(origins) = args.cors_origins {
        config.api.allowed_origins = origins.split(',').map(|s| s.trim().to_string()).collect();
    }
    config.validate()?;

    if args.print_config {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    ApiServer::from_config(config)?.run().await
}
