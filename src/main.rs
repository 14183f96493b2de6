mod config;
mod engine;
mod http;
mod logging;
mod pid;
mod policy;
mod store;
mod subscriber;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use config::Settings;
use engine::{AuthEngine, EngineConfig};
use store::{GraphStore, PostgresMetadataStore, SpiceDbGraphStore};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("loading configuration")?;
    logging::init(&settings.log_dir, "permissions-engine")?;

    info!("starting permissions engine");
    info!(policy_path = %settings.policy_path.display(), "compiling policy");
    let policy = Arc::new(
        policy::compile_from_dir(&settings.policy_path).context("compiling policy document")?,
    );
    info!(actions = policy.actions.len(), types = policy.resource_types.len(), "policy compiled");

    info!(endpoint = %settings.graph_store_endpoint, "connecting to graph store");
    let graph = Arc::new(
        SpiceDbGraphStore::connect(
            settings.graph_store_endpoint.clone(),
            settings.graph_store_preshared_key.clone(),
        )
        .await
        .context("connecting to graph store")?,
    );
    graph
        .write_schema(&policy::schema::render_schema(&policy))
        .await
        .context("writing compiled schema to graph store")?;

    info!("connecting to metadata store");
    let metadata = Arc::new(
        PostgresMetadataStore::connect(&settings.metadata_dsn)
            .await
            .context("connecting to metadata store")?,
    );

    let engine_config = EngineConfig {
        check_concurrency: settings.check_concurrency,
        check_timeout: settings.check_timeout(),
    };
    let engine = Arc::new(AuthEngine::new(policy, metadata, graph, engine_config));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let app_state = Arc::new(http::AppState {
        engine: engine.clone(),
        settings: settings.clone(),
    });
    let router = http::create_router(app_state);
    let listener = tokio::net::TcpListener::bind(&settings.bind_address)
        .await
        .with_context(|| format!("binding to {}", settings.bind_address))?;
    info!(address = %settings.bind_address, "listening");

    let mut http_shutdown_rx = shutdown_rx.clone();
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        http_shutdown_rx.changed().await.ok();
    });
    let server_task = tokio::spawn(server);

    let subscriber = subscriber::Subscriber::connect(&settings, engine.clone())
        .await
        .context("connecting change subscriber to message bus")?;
    let subscriber_task = tokio::spawn(subscriber.run(shutdown_rx));

    tokio::signal::ctrl_c().await.ok();
    info!("received ctrl-c, shutting down");
    let _ = shutdown_tx.send(true);

    if let Ok(Err(err)) = server_task.await {
        error!(%err, "http server exited with error");
    }
    match subscriber_task.await {
        Ok(Err(err)) => error!(%err, "change subscriber exited with error"),
        Err(err) => error!(%err, "change subscriber task panicked"),
        Ok(Ok(())) => {}
    }

    Ok(())
}
