//! oidcng server binary.
//!
//! Loads configuration, initializes key material and storage, and serves the
//! OpenID Connect endpoints with graceful shutdown.

use anyhow::Result;
use oidcng::{
    config::Config,
    http::{AppEngine, AppState, build_router},
    keys::KeyManager,
    oauth::TokenGenerator,
    storage::{cleaner::run_cleaner, create_storage_backend, parse_storage_backend},
    templates::build_env,
};
use std::{env, sync::Arc};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "oidcng=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();

    let version = oidcng::config::version()?;

    env::args().for_each(|arg| {
        if arg == "--version" {
            println!("{version}");
            std::process::exit(0);
        }
    });

    tracing::info!(?version, "Starting oidcng");

    let config = Config::new()?;

    let http_client = reqwest::Client::builder()
        .user_agent(format!("oidcng/{}", version))
        .build()?;

    let template_env = AppEngine::from(build_env(
        &config.http_templates_path,
        config.version.clone(),
    ));

    let storage_backend =
        parse_storage_backend(&config.storage_backend, config.database_url.as_deref())?;
    let oauth_storage = create_storage_backend(storage_backend).await?;

    let key_manager = Arc::new(KeyManager::new(
        config.load_secret_key_set()?,
        &config.associated_data,
        oauth_storage.clone(),
    ));
    key_manager.initialize().await?;

    let token_generator = Arc::new(
        TokenGenerator::new(
            key_manager,
            &config.issuer,
            config.openid_configuration.acr_values_supported.clone(),
            &config.default_acr_value,
        )
        .with_fixed_clock(*config.fixed_clock.as_ref()),
    );
    if let Some(instant) = config.fixed_clock.as_ref() {
        tracing::warn!(%instant, "token clock is frozen");
    }

    let app_context = AppState::new(
        http_client,
        Arc::new(config.clone()),
        template_env,
        oauth_storage.clone(),
        token_generator,
    );

    let app = build_router(app_context);

    // Setup graceful shutdown
    let tracker = TaskTracker::new();
    let token = CancellationToken::new();

    {
        let tracker = tracker.clone();
        let inner_token = token.clone();

        let ctrl_c = async {
            if let Err(err) = signal::ctrl_c().await {
                tracing::error!("failed to install Ctrl+C handler: {}", err);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(err) => {
                    tracing::error!("failed to install signal handler: {}", err);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::spawn(async move {
            tokio::select! {
                () = inner_token.cancelled() => { },
                _ = terminate => {},
                _ = ctrl_c => {},
            }

            tracker.close();
            inner_token.cancel();
        });
    }

    if *config.cleaner_enabled.as_ref() {
        let interval = *config.cleaner_interval.as_ref();
        tracing::info!(?interval, "Starting cleaner");
        tracker.spawn(run_cleaner(
            oauth_storage,
            interval,
            *config.user_retention.as_ref(),
            token.clone(),
        ));
    }

    // Start HTTP server
    {
        let http_port = *config.http_port.as_ref();
        let inner_token = token.clone();
        tracker.spawn(async move {
            let bind_address = format!("0.0.0.0:{http_port}");
            tracing::info!("Starting server on {bind_address}");
            let listener = match TcpListener::bind(&bind_address).await {
                Ok(listener) => listener,
                Err(err) => {
                    tracing::error!("failed to bind {}: {}", bind_address, err);
                    inner_token.cancel();
                    return;
                }
            };

            let shutdown_token = inner_token.clone();
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    tokio::select! {
                        () = shutdown_token.cancelled() => { }
                    }
                    tracing::info!("axum graceful shutdown complete");
                })
                .await;
            if let Err(err) = result {
                tracing::error!("axum task failed: {}", err);
            }

            inner_token.cancel();
        });
    }

    tracker.wait().await;

    Ok(())
}
