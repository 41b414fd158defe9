//! CyberDeck - main entry point.

use clap::Parser;
use cyberdeck_core::args::Args;
use cyberdeck_core::web::http_server;
use cyberdeck_core::web::SharedState;
use cyberdeck_core::{config, discovery, input, mdns};
use log::{error, info};
use std::sync::Arc;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::new()
        .parse_filters(&format!("cyberdeck_core={},mdns_sd=warn", log_level))
        .init();

    info!("cyberdeck-core v{} starting", env!("CARGO_PKG_VERSION"));

    let config = config::shared_from_env();
    args.apply(&mut config.write());

    let backend = input::build_backend();
    let state = Arc::new(SharedState::new(config.clone(), backend));
    state.devices.load();
    info!("Loaded {} paired device(s)", state.devices.session_count());

    // Settle the listen port before anything advertises it.
    http_server::pick_port(&state);

    if !args.no_discovery {
        discovery::start(config.clone());
    }
    let _mdns = if config.read().mdns_enabled {
        mdns::start(&config)
    } else {
        None
    };

    {
        let cfg = config.read();
        info!(
            "Pairing code: {} (server id {}, {}://0.0.0.0:{})",
            cfg.pairing_code,
            cfg.server_id,
            cfg.scheme(),
            cfg.port
        );
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to start async runtime: {}", err);
            error!("Failed to start async runtime: {}", err);
            std::process::exit(1);
        }
    };
    if let Err(err) = runtime.block_on(http_server::serve(state)) {
        eprintln!("Server error: {}", err);
        error!("Server error: {}", err);
        std::process::exit(1);
    }
    info!("Shutdown complete");
}
