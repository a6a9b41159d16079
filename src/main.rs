use std::path::PathBuf;

use ::tracing::{error, info_span};
use clap::Parser;
use service::Service;

mod config;
mod http_objects;
mod pipeline;
mod routes;
mod service;
mod tracing;
use tracing::setup_tracing;
#[cfg(test)]
mod testing;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(short, long, value_name = "config file", help = "Path to config file")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => config::ServerConfig::from_path(path.to_str().unwrap()).unwrap(),
        None => config::ServerConfig::default(),
    };

    if let Err(err) = setup_tracing(&config) {
        error!("Error setting up tracing: {:?}", err);
        return;
    }

    let root_span = info_span!(
        "chainpin",
        env = %config.env,
        "chainpin-instance" = %uuid::Uuid::new_v4()
    );
    let _guard = root_span.enter();

    let service = Service::new(config);
    if let Err(err) = service {
        error!("Error creating service: {:?}", err);
        return;
    }
    if let Err(err) = service.unwrap().start().await {
        error!("Error starting service: {:?}", err);
    }
}
