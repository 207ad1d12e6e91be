/*!
 * Loci Kernel - Main Entry Point
 *
 * Headless host for the supervised servers:
 * - Set up tracing, then load config (optional JSON file, then environment overrides)
 * - Materialize and supervise every enabled subprogram
 * - Run until Ctrl-C, then kill the children
 */

use anyhow::Context;
use loci_kernel::{init_tracing, KernelConfig, LifecycleCoordinator};
use std::path::PathBuf;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Before config loading, so its events are recorded.
    // JSON output here comes from LOCI_KERNEL_TRACE_JSON only.
    init_tracing(false);

    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = KernelConfig::load(path.as_deref()).with_context(|| match &path {
        Some(path) => format!("loading config from {}", path.display()),
        None => "reading config from environment".to_string(),
    })?;
    config.validate().context("invalid kernel config")?;

    if config.trace_json && std::env::var_os("LOCI_KERNEL_TRACE_JSON").is_none() {
        warn!("trace_json from the config file is ignored; set LOCI_KERNEL_TRACE_JSON=1");
    }

    info!("Loci kernel starting...");
    info!(
        data_dir = %config.data_dir.display(),
        install_dir = %config.install_dir().display(),
        subprograms = ?config.subprograms,
        "Kernel configuration"
    );

    let coordinator = LifecycleCoordinator::builder(config).build();
    coordinator.on_restart(|event| {
        warn!(
            subprogram = %event.name,
            restart_count = event.restart_count,
            "Subprogram restarted"
        );
    });

    let report = coordinator.start().await.context("starting supervisors")?;
    info!(
        supervised = ?report.supervised,
        disabled = ?report.disabled,
        ui_url = %report.ui_url,
        "Kernel ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;

    info!("Shutdown signal received");
    for status in coordinator.shutdown().await {
        info!(
            subprogram = %status.name,
            restarts = status.restarts,
            spawns = status.spawns,
            "Supervisor final status"
        );
    }

    Ok(())
}
