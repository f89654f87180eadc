//! Droptrack daemon -- tails the game client log and reports item drops.
//!
//! # Usage
//!
//! ```bash
//! droptrack-daemon --config /etc/droptrack/droptrack.toml
//! droptrack-daemon --log-file ~/game/UE_game.log --from-beginning
//! droptrack-daemon --validate  # validate config and exit
//! ```

use anyhow::Result;
use clap::Parser;

use droptrack_core::config::DroptrackConfig;
use droptrack_daemon::cli::DaemonCli;
use droptrack_daemon::logging;
use droptrack_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // File first, then DROPTRACK_* environment, then command-line flags.
    let mut config = match &cli.config {
        Some(path) => DroptrackConfig::from_file(path).await.map_err(|e| {
            anyhow::anyhow!("failed to load config from {}: {}", path.display(), e)
        })?,
        None => DroptrackConfig::default(),
    };
    config.apply_env_overrides();
    cli.apply_overrides(&mut config);

    if cli.validate {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("configuration validation failed: {}", e))?;
        println!("configuration is valid");
        return Ok(());
    }

    logging::init_tracing(&config.general)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_path = %config.tailer.log_path,
        from_end = config.tailer.from_end,
        "starting droptrack-daemon"
    );

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    orchestrator.run().await?;

    tracing::info!("droptrack-daemon stopped");
    Ok(())
}
