use crate::dockerhub::{CallbackAcknowledger, DockerHubPipeline};
use crate::gcr::GcrPipeline;
use crate::trigger::{JenkinsTrigger, Trigger};
use crate::webserver::AppState;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod dockerhub;
mod error;
mod gcr;
mod http_client;
mod image_reference;
mod pipeline;
mod secret_string;
mod trigger;
mod webserver;

#[cfg(target_env = "musl")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    info!("Starting registry-webhook-relay {}", env!("CARGO_PKG_VERSION"));

    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
    let config = config::load_config(&config_path)?;

    let http_client = http_client::create_client(&config.http)?;
    let timeout = Duration::from_secs(config.http.timeout_seconds);
    let jenkins: Arc<dyn Trigger> =
        Arc::new(JenkinsTrigger::new(&config.jenkins, http_client.clone()));

    info!(
        "Accepting DockerHub pushes for namespaces {:?}",
        config.dockerhub.namespaces
    );
    let state = AppState {
        dockerhub: Arc::new(DockerHubPipeline::new(
            config.dockerhub.namespaces.iter().cloned().collect(),
            CallbackAcknowledger::new(http_client),
            jenkins.clone(),
            timeout,
        )),
        gcr: Arc::new(GcrPipeline::new(config.gcr.secret, jenkins, timeout)),
    };

    let app = webserver::create_app(state);
    let addr = SocketAddr::new(config.webserver.bind_address, config.webserver.port);
    info!("Starting webserver on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Webserver stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {:?}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {:?}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, draining in-flight requests");
}
