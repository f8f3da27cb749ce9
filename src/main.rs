//! roomlink - pairs Matrix users with direct rooms and pushes notifications to them.
//!
//! # Usage
//!
//! ```bash
//! roomlink --config config.yaml --data ./roomlink-data
//! ```
//!
//! See [`roomlink::config`] for the configuration format. Values can be
//! overridden with `ROOMLINK_`-prefixed environment variables:
//!
//! ```bash
//! export ROOMLINK_MATRIX__PASSWORD="your-password"
//! export ROOMLINK_MATRIX__PASSPHRASE="your-passphrase"
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - Controls logging level (default: `info`)

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use env_logger::Env;
use log::{error, info};
use roomlink::{
    config::Config,
    daemon::{Collaborators, Daemon, DaemonSettings},
    lang::Catalog,
    matrix::MatrixClient,
    rooms::JsonBindingStore,
};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: String,

    /// Path to the directory for storing persistent data.
    ///
    /// This directory will contain:
    /// - `session/` - Matrix session data (authentication tokens, device keys)
    /// - `bindings.json` - paired rooms and their language
    ///
    /// It holds the bot credentials and encryption keys: restrict its permissions.
    #[arg(short, long)]
    data: String,
}

fn data_path(dir_path: &str, name: &str) -> String {
    let path: PathBuf = [dir_path, name].iter().collect();
    path.to_string_lossy().into_owned()
}

#[tokio::main]
async fn main() {
    // Put logger at info level by default
    let env = Env::default().filter_or("RUST_LOG", "info");
    env_logger::init_from_env(env);

    info!("Starting roomlink {}...", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load config file: {}", e);
            return;
        }
    };

    let catalog = match Catalog::load(config.languages.as_deref()) {
        Ok(catalog) => catalog,
        Err(e) => {
            error!("Failed to load languages: {:?}", e);
            return;
        }
    };

    let client = match MatrixClient::new(
        &config.credentials(),
        &data_path(&args.data, "session"),
    )
    .await
    {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to initialize matrix client: {:?}", e);
            return;
        }
    };

    let settings = DaemonSettings {
        user_id: config.matrix.user_id.clone(),
        topic: config.matrix.topic.clone(),
    };
    let collaborators = Collaborators {
        transport: client.clone(),
        gateway: client,
        store: Arc::new(JsonBindingStore::new(&data_path(&args.data, "bindings.json"))),
    };
    let daemon = match Daemon::new(settings, collaborators, catalog).await {
        Ok(daemon) => Arc::new(daemon),
        Err(e) => {
            error!("Failed to initialize daemon: {:?}", e);
            return;
        }
    };

    tokio::spawn({
        let daemon = Arc::clone(&daemon);
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for ctrl-c: {}", e);
                return;
            }
            daemon.shutdown();
        }
    });

    if let Err(e) = daemon.run().await {
        error!("Daemon stopped: {:?}", e);
    }
}
