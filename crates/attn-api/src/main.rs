//! Attention gateway binary.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use attn_api::{create_router, metrics, ApiConfig, AppState};
use attn_hub::{
    DistributionHub, HubConfig, PersisterConfig, RedisSampleSink, SampleSink, SampledPersister,
    TracingSampleSink,
};
use attn_vision::RemoteExtractor;
use attn_worker::{PipelineConfig, PipelineWorkerPool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing()?;

    info!("Starting attn-api");

    let config = ApiConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);

    let metrics_handle = if config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("failed to install Prometheus recorder")?)
    } else {
        None
    };

    let hub = Arc::new(DistributionHub::new(HubConfig::from_env()));

    let sink: Arc<dyn SampleSink> = match &config.redis_url {
        Some(url) => Arc::new(
            RedisSampleSink::new(url, config.sample_stream_max_len)
                .context("invalid REDIS_URL")?,
        ),
        None => {
            info!("REDIS_URL not set, attention samples will only be logged");
            Arc::new(TracingSampleSink)
        }
    };
    let (persister, writer) = SampledPersister::start(PersisterConfig::from_env(), sink);
    let persister = Arc::new(persister);

    let extractor = RemoteExtractor::from_env().context("failed to build feature extractor")?;
    match extractor.health_check().await {
        Ok(true) => info!("Face analysis services are healthy"),
        Ok(false) => warn!("Some face analysis services report unhealthy; frames will degrade"),
        Err(e) => warn!(error = %e, "Face analysis services unreachable; frames will degrade"),
    }

    let pipeline_config = PipelineConfig::from_env().context("invalid pipeline configuration")?;
    let pool = Arc::new(PipelineWorkerPool::start(
        pipeline_config,
        Arc::new(extractor),
        Arc::clone(&hub),
        Some(Arc::clone(&persister)),
    )?);

    let state =
        AppState::new(config.clone(), Arc::clone(&pool), hub).with_persister(Arc::clone(&persister));
    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid bind address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // Drain in-flight frames, then let the sample writer flush
    pool.shutdown().await?;
    drop(pool);
    drop(persister);
    if tokio::time::timeout(Duration::from_secs(5), writer).await.is_err() {
        warn!("Sample writer did not finish before timeout");
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("attn=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
