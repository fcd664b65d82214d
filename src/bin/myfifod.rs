//! myfifod: myfifo device daemon
//!
//! Loads the FIFO device into a local registry and serves its node on a
//! Unix socket until Ctrl+C.
//!
//! ## Configuration
//! - First argument: optional path to a YAML config file
//! - MYFIFO_CONFIG: config file path
//! - MYFIFO__DEVICE__CAPACITY, MYFIFO__SERVER__SOCKET_PATH, ...: overrides
//! - MYFIFO_LOG: tracing filter (default: info)

use std::sync::Arc;

use tracing::{error, info};

use myfifo::config::Config;
use myfifo::device::{DeviceRegistry, FifoModule, LocalRegistry};
use myfifo::signal::Interrupter;
use myfifo::transport::FifoServer;
use myfifo::utils::bootstrap::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let path = std::env::args().nth(1);
    let config = Config::load(path.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!("Starting myfifod");

    let registry: Arc<dyn DeviceRegistry> = Arc::new(LocalRegistry::new());
    let module = FifoModule::load(Arc::clone(&registry), &config.device).await?;

    let server = match FifoServer::bind(&config.server, registry, module.node()).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to bind socket: {}", e);
            module.unload().await;
            return Err(e.into());
        }
    };

    let shutdown = Interrupter::new();
    let serving = tokio::spawn(server.run(shutdown.token()));

    info!("Device ready, press Ctrl+C to exit");
    tokio::signal::ctrl_c().await?;

    shutdown.interrupt();
    let served = serving.await;
    module.unload().await;

    served??;
    Ok(())
}
