//! Daemon orchestration -- assembly, drop logging, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `droptrack-daemon`.
//! It installs the metrics recorder, loads the item catalog, builds the
//! [`DropTracker`], subscribes the drop logger, and runs the main loop until
//! a shutdown signal arrives.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::Serialize;

use droptrack_core::config::DroptrackConfig;
use droptrack_core::event::DropEvent;
use droptrack_core::pipeline::{HealthStatus, Pipeline};
use droptrack_log_pipeline::{DropTracker, DropTrackerBuilder, ItemCatalog, Subscription};

use crate::metrics_server;

/// Interval between periodic health reports in the main loop.
const HEALTH_REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// The main daemon orchestrator.
///
/// Owns the drop tracker and the subscription that logs each drop.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: DroptrackConfig,
    /// The tailing/aggregation pipeline.
    tracker: DropTracker,
    /// Drop logger subscription (kept alive for the daemon lifetime).
    drop_logger: Subscription,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

/// Summary printed when the daemon stops.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    /// Seconds since the orchestrator was built
    pub uptime_secs: u64,
    /// Last line number read by the tailer
    pub lines_read: u64,
    /// Number of maps entered this session
    pub maps_completed: u64,
    /// Value of all drops recorded this session
    pub session_revenue: f64,
    /// Value of drops in the currently open map
    pub current_map_revenue: f64,
    /// Drop events still in the notifier backlog
    pub recent_drops: usize,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or parsed,
    /// or if any step of [`Orchestrator::build_from_config`] fails.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = DroptrackConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    ///
    /// Useful for testing or when CLI overrides have already been applied.
    pub async fn build_from_config(config: DroptrackConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        let catalog = load_catalog(&config).await?;

        let tracker = DropTrackerBuilder::new()
            .core_config(&config)
            .lookup(Arc::new(catalog))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build drop tracker: {}", e))?;

        let drop_logger = tracker.notifier().subscribe(|event: &DropEvent| {
            log_drop(event);
            Ok(())
        });

        tracing::info!(
            processors = ?tracker.processor_names(),
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            tracker,
            drop_logger,
            start_time: Instant::now(),
        })
    }

    /// Start tailing and enter the main loop.
    ///
    /// Blocks until `SIGTERM` or `SIGINT` is received, then stops the
    /// tracker and logs the session summary.
    pub async fn run(&mut self) -> Result<()> {
        self.tracker
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start drop tracker: {}", e))?;

        let mut health_interval = tokio::time::interval(HEALTH_REPORT_INTERVAL);
        health_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // the first tick completes immediately
        health_interval.tick().await;

        tracing::info!("entering main event loop");
        let shutdown = wait_for_shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                signal = &mut shutdown => {
                    let signal = signal?;
                    tracing::info!(signal = signal, "shutdown signal received");
                    break;
                }
                _ = health_interval.tick() => {
                    self.report_health().await;
                }
            }
        }

        self.shutdown().await?;

        let summary = self.summary();
        tracing::info!(
            uptime_secs = summary.uptime_secs,
            lines_read = summary.lines_read,
            maps_completed = summary.maps_completed,
            session_revenue = summary.session_revenue,
            "session finished"
        );
        println!("{}", serde_json::to_string_pretty(&summary)?);

        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("stopping drop tracker");
        self.drop_logger.unsubscribe();
        self.tracker
            .stop()
            .await
            .map_err(|e| anyhow::anyhow!("failed to stop drop tracker: {}", e))
    }

    async fn report_health(&self) {
        match self.tracker.health_check().await {
            HealthStatus::Healthy => tracing::debug!(
                line = self.tracker.current_line_number(),
                "drop tracker healthy"
            ),
            HealthStatus::Degraded(reason) => {
                tracing::warn!(reason = %reason, "drop tracker degraded")
            }
            HealthStatus::Unhealthy(reason) => {
                tracing::error!(reason = %reason, "drop tracker unhealthy")
            }
        }
    }

    /// Build the session summary from the tracker statistics.
    ///
    /// Statistics that cannot be read from the repository are reported as zero.
    pub fn summary(&self) -> SessionSummary {
        let stats = self.tracker.stats();
        SessionSummary {
            uptime_secs: self.start_time.elapsed().as_secs(),
            lines_read: self.tracker.current_line_number(),
            maps_completed: stats.maps_completed().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to count completed maps");
                0
            }),
            session_revenue: stats.session_revenue().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to compute session revenue");
                0.0
            }),
            current_map_revenue: stats.current_map_revenue().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to compute current map revenue");
                0.0
            }),
            recent_drops: self.tracker.notifier().snapshot().len(),
        }
    }

    /// Get a reference to the drop tracker.
    pub fn tracker(&self) -> &DropTracker {
        &self.tracker
    }

    /// Get a mutable reference to the drop tracker.
    pub fn tracker_mut(&mut self) -> &mut DropTracker {
        &mut self.tracker
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &DroptrackConfig {
        &self.config
    }
}

/// Load the item catalog, or an empty one when no path is configured.
async fn load_catalog(config: &DroptrackConfig) -> Result<ItemCatalog> {
    if config.catalog.path.is_empty() {
        tracing::info!("no item catalog configured, drops will use raw item ids");
        return Ok(ItemCatalog::empty());
    }

    let catalog = ItemCatalog::load(&config.catalog.path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load item catalog: {}", e))?;
    tracing::info!(
        path = %config.catalog.path,
        items = catalog.len(),
        "item catalog loaded"
    );
    Ok(catalog)
}

fn log_drop(event: &DropEvent) {
    tracing::info!(
        item = %event.label,
        delta = event.delta,
        total = event.total,
        value = event.delta_value(),
        map_started_at = ?event.map_started_at,
        "item drop"
    );
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to install Ctrl-C handler: {}", e))?;
    Ok("CTRL_C")
}
