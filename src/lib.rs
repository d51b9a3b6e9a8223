use std::sync::Arc;

use config::Config;
use router::Router;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter, FmtSubscriber};
use transport::sqs::SqsTransport;

pub mod config;
pub mod error;
pub mod ingress;
pub mod lambda;
pub mod message;
pub mod router;
pub mod schedule;
pub mod transport;

/// Returns a builder for the router process.
///
/// Without an explicit config, it is loaded from `SQDELAY_*` environment
/// variables. Under the Lambda runtime it serves pushed event batches.
/// Anywhere else it polls the incoming queue until SIGINT, SIGTERM or SIGHUP.
#[bon::builder(finish_fn = start)]
pub async fn run(config: Option<Config>) -> eyre::Result<()> {
    #[cfg(debug_assertions)]
    FmtSubscriber::builder()
        .pretty()
        .with_env_filter(
            EnvFilter::builder()
                .with_env_var("SQDELAY_LOG")
                .with_default_directive(LevelFilter::INFO.into())
                .from_env()?,
        )
        .finish()
        .try_init()?;

    #[cfg(not(debug_assertions))]
    FmtSubscriber::builder()
        .json()
        .with_env_filter(
            EnvFilter::builder()
                .with_env_var("SQDELAY_LOG")
                .with_default_directive(LevelFilter::INFO.into())
                .from_env()?,
        )
        .finish()
        .try_init()?;

    let config = match config {
        Some(config) => {
            config.validate()?;
            config
        }
        None => Config::load()?,
    };

    let transport = SqsTransport::from_env(config.endpoint_url()).await;

    let router = Router::builder()
        .transport(transport)
        .config(config.router_config())
        .max_messages(config.max_messages())
        .wait_time_seconds(config.wait_time_seconds())
        .build();

    if lambda::running_in_lambda(|key| std::env::var(key).ok()) {
        return lambda::serve(Arc::new(router)).await;
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            match shutdown_signal().await {
                Ok(signal) => tracing::info!(signal, "got signal, shutting down"),
                Err(e) => tracing::error!("Failed to listen for shutdown signals: {e}"),
            }
            cancel.cancel();
        }
    });

    router.poll(cancel).await;

    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res.map(|_| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
        _ = hangup.recv() => Ok("SIGHUP"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|_| "ctrl-c")
}
