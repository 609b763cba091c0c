use super::utils::print_banner;
use reframe_daemon::{ProxyConfig, ProxyServer};
use reframe_types::{ReframeError, ReframeResult};
use std::path::PathBuf;
use tracing::info;

pub async fn run_proxy(
    config_path: &PathBuf,
    data_dir: &PathBuf,
    pid_file: Option<PathBuf>,
) -> ReframeResult<()> {
    print_banner();
    info!("Starting reframe v{}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {:?}", data_dir);

    if let Some(ref pid_path) = pid_file {
        let pid = std::process::id();
        std::fs::write(pid_path, pid.to_string())
            .map_err(|e| ReframeError::Config(format!("Failed to write PID file: {}", e)))?;
        info!("PID file written: {:?}", pid_path);
    }

    std::fs::create_dir_all(data_dir)
        .map_err(|e| ReframeError::Config(format!("Failed to create data directory: {}", e)))?;

    let config = ProxyConfig::load(config_path)?;
    config.log_security_warnings();

    let server = ProxyServer::new(&config)?;
    server.start().await?;

    print_ready_message(config.socket_addr());

    wait_for_shutdown().await;

    info!("Shutting down...");
    server.stop().await;

    if let Some(ref pid_path) = pid_file {
        let _ = std::fs::remove_file(pid_path);
    }

    info!("Shutdown complete");
    Ok(())
}

fn print_ready_message(addr: std::net::SocketAddr) {
    println!();
    println!("  \x1b[1;38;5;51mreframe is running\x1b[0m");
    println!();
    println!("  Proxy:  \x1b[38;5;51mhttp://{}/proxy?url=<encoded-url>\x1b[0m", addr);
    println!("  Health: http://{}/healthz", addr);
    println!("  Stats:  http://{}/api/stats", addr);
    println!();
    println!("  \x1b[38;5;245mPress Ctrl+C to stop\x1b[0m");
    println!();
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => { info!("Received SIGTERM"); }
            _ = sigint.recv() => { info!("Received SIGINT"); }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Received Ctrl+C");
    }
}
