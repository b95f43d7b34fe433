use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use proxy_purge::{
    application::error::AppError,
    cache::{CacheConfig, CacheInvalidator},
    config::{self, Command},
    infra::{
        error::InfraError,
        http::{self, AdminState},
        telemetry,
    },
};
use tokio::{signal, task};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;

    let command = cli_args
        .command
        .unwrap_or(Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let cache_config = CacheConfig::initialize(settings.cache.clone())?;
    cache_config.validate()?;

    info!(
        target = "proxy_purge::startup",
        root = %cache_config.root().display(),
        levels = %cache_config.levels().join(":"),
        key_format = cache_config.key_template(),
        enabled = cache_config.caching_enabled(),
        "cache configuration loaded"
    );

    let invalidator = CacheInvalidator::new(Arc::new(cache_config));

    match command {
        Command::Serve(_) => run_serve(&settings, invalidator).await,
        Command::Purge(args) => run_purge(invalidator, args.urls).await,
        Command::PurgeAll(_) => run_purge_all(invalidator).await,
        Command::Locate(args) => run_locate(&invalidator, &args.urls),
    }
}

async fn run_serve(
    settings: &config::Settings,
    invalidator: CacheInvalidator,
) -> Result<(), AppError> {
    let router = http::build_admin_router(AdminState::new(invalidator));

    let listener = tokio::net::TcpListener::bind(settings.admin.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "proxy_purge::serve",
        addr = %settings.admin.addr,
        "admin listener started"
    );

    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .into_future();
    tokio::pin!(server);

    let grace = settings.admin.graceful_shutdown;
    tokio::select! {
        result = &mut server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = shutdown_deadline(grace) => {
            warn!(
                target = "proxy_purge::serve",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping in-flight requests"
            );
        }
    }

    info!(target = "proxy_purge::serve", "admin listener stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!(
            target = "proxy_purge::serve",
            error = %err,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
    info!(target = "proxy_purge::serve", "shutdown signal received");
}

async fn shutdown_deadline(grace: Duration) {
    if signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(grace).await;
}

async fn run_purge(invalidator: CacheInvalidator, urls: Vec<String>) -> Result<(), AppError> {
    let outcomes = task::spawn_blocking(move || {
        urls.into_iter()
            .map(|url| {
                let outcome = invalidator.purge(&url);
                (url, outcome)
            })
            .collect::<Vec<_>>()
    })
    .await
    .map_err(|err| AppError::unexpected(format!("purge task failed: {err}")))?;

    let mut failed = Vec::new();
    for (url, outcome) in &outcomes {
        println!("{}\t{}", outcome.as_str(), url);
        if !outcome.succeeded() {
            failed.push(url.as_str());
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(AppError::PurgeFailed(failed.join(", ")))
    }
}

async fn run_purge_all(invalidator: CacheInvalidator) -> Result<(), AppError> {
    let purged = task::spawn_blocking(move || invalidator.purge_entire_cache())
        .await
        .map_err(|err| AppError::unexpected(format!("purge task failed: {err}")))?;

    if purged {
        println!("entire_cache\tpurged");
        Ok(())
    } else {
        Err(AppError::PurgeFailed(
            "one or more entries below the cache root".to_string(),
        ))
    }
}

fn run_locate(invalidator: &CacheInvalidator, urls: &[String]) -> Result<(), AppError> {
    for url in urls {
        let location = invalidator.locate(url)?;
        println!(
            "{}\t{}\t{}",
            url,
            location.key(),
            location.path().display()
        );
    }
    Ok(())
}
