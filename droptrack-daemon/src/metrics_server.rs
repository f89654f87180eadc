//! Prometheus exporter for the `droptrack_*` metrics.
//!
//! The exporter's own HTTP listener serves the scrape endpoint. Endpoint and
//! address are checked by `DroptrackConfig::validate`; this module only turns
//! the validated section into a socket address and installs the recorder.
//! Every series carries `app="droptrack"` and the daemon version so scrapes
//! from several game clients can be told apart after a restart.

use std::net::{IpAddr, SocketAddr};

use anyhow::Result;
use droptrack_core::config::MetricsConfig;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Value of the `app` label attached to every series.
pub const APP_LABEL: &str = "droptrack";

/// Socket address the exporter binds to.
///
/// Accepts IPv4 and IPv6 literals without brackets.
pub fn listen_socket(config: &MetricsConfig) -> Result<SocketAddr> {
    let ip: IpAddr = config.listen_addr.trim().parse().map_err(|e| {
        anyhow::anyhow!(
            "invalid metrics listen address '{}': {}",
            config.listen_addr,
            e
        )
    })?;
    Ok(SocketAddr::new(ip, config.port))
}

/// Install the global metrics recorder and start the scrape listener.
///
/// Call once per process; a second call fails because the global recorder
/// is already set.
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    let addr = listen_socket(config)?;

    if !addr.ip().is_loopback() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is reachable from other hosts"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("app", APP_LABEL)
        .add_global_label("version", env!("CARGO_PKG_VERSION"))
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder on {}: {}", addr, e))?;

    droptrack_core::metrics::describe_all();

    tracing::info!(
        listen_addr = %addr,
        endpoint = %config.endpoint,
        "metrics exporter listening"
    );

    Ok(())
}
