use bridge_host::error::HostError;
use bridge_host::host::{BridgeHost, auth_token_from_env};
use bridge_host::logger::{initialize as LoggerInitialize, log_file_path};

use bridge_core::{BridgeConfig, CoreError};

use std::fs::create_dir_all;
use std::path::PathBuf;

use log::{info, warn};

const APP_DIR_NAME: &str = "bridge-host";

#[tokio::main]
async fn main() -> Result<(), HostError> {
    // .env is optional; real environment variables win
    let _ = dotenvy::dotenv();

    let config_dir = app_dir(dirs::config_dir(), "config")?;
    let log_dir = app_dir(dirs::data_local_dir(), "logs")?.join("logs");
    create_dir_all(&log_dir)
        .map_err(|e| HostError::host(format!("Failed to create log directory: {e}")))?;

    // Initialize logger FIRST
    LoggerInitialize(&log_dir)?;

    info!("Bridge host starting");
    info!("Log file: {}", log_file_path(&log_dir).display());

    let config = BridgeConfig::load(&config_dir).map_err(CoreError::from)?;
    info!(
        "Config: port {}, call timeout {}ms, parameter match {:?}",
        config.transport.ipc_port, config.rpc.call_timeout_ms, config.binding.parameter_match
    );

    let (auth_token, generated) = auth_token_from_env(&config.transport.auth_token_env);
    if generated {
        warn!(
            "{} not set; generated a one-off token for this session",
            config.transport.auth_token_env
        );
        // The document needs the token to connect; print it once, outside the log file.
        println!("{}={}", config.transport.auth_token_env, auth_token.expose());
    }

    let host = BridgeHost::start(&config, config.transport.ipc_port, auth_token).await?;
    info!("Bridge host listening on 127.0.0.1:{}", host.port());

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| HostError::host(format!("Failed to listen for Ctrl-C: {e}")))?;

    host.shutdown().await;
    Ok(())
}

#[track_caller]
fn app_dir(base: Option<PathBuf>, kind: &str) -> Result<PathBuf, HostError> {
    base.map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| HostError::host(format!("No {kind} directory on this platform")))
}
