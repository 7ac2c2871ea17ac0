#![cfg(not(tarpaulin_include))]

use log::info;
use std::env;
use weldlog::app;
use weldlog::config::ServerConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Environment first, then `[master_path] [header_row]` on the command line
    let args: Vec<String> = env::args().collect();
    let mut config = ServerConfig::from_env()?;
    config.apply_args(&args[1..])?;

    info!(
        "Starting weld log with settings at {}",
        config.settings_path.display()
    );
    app::run(config).await
}
