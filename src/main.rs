use std::sync::Arc;

use clap::Parser;
use colored::Colorize;

use podwise::clock::SystemClock;
use podwise::config::{Args, Config};
use podwise::core::CoreHandle;
use podwise::k8s::{ClusterClient, KubeClusterClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    std::env::set_var(
        "RUST_LOG",
        std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
    );
    env_logger::init();

    println!("{}", "📊 podwise-sidecar starting up...".bright_cyan().bold());

    let config = Config::load().apply_args(&args);
    log::info!(
        "configuration loaded: port={} namespaces={:?} collection_interval={:?}",
        config.port,
        config.namespaces,
        config.collection_interval
    );

    let cluster: Arc<dyn ClusterClient> = Arc::new(KubeClusterClient::new(config.kubeconfig.as_deref()).await?);
    let clock = Arc::new(SystemClock);
    let core = Arc::new(CoreHandle::new(config.clone(), cluster, clock));

    core.sampler.start().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    log::info!("sampler started");

    core.start_broadcast_loop();
    log::info!("broadcast loop started");

    let app = podwise::http::router(core.clone());
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    log::info!("listening on 0.0.0.0:{}", config.port);

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

    if let Err(e) = server.await {
        log::error!("server error: {e}");
    }

    log::info!("shutting down sampler");
    core.sampler.stop().await;
    core.stop_broadcast_loop().await;

    println!("{}", "👋 podwise-sidecar stopped".bright_cyan());
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    log::info!("ctrl-c received, beginning graceful shutdown");
}
