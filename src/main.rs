use std::{collections::HashMap, process::ExitCode, sync::Arc};

use content_archive::{
    application::{
        archive::ArchiveService,
        error::AppError,
        filters::{FIELD_CATEGORY, FIELD_DATE_FROM, FIELD_DATE_TO},
        nonce::NonceGuard,
        repos::{CategoriesRepo, PostsRepo},
        settings::InMemorySettings,
    },
    cache::{CacheConfig, MemoryCache},
    config,
    domain::display::DisplayAttributes,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ArchiveState},
        memory::InMemoryPostsRepo,
        telemetry,
    },
    util::clock::{Clock, SystemClock},
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use uuid::Uuid;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report_application_error(&error);
            ExitCode::from(error.exit_code())
        }
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
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
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Export(args) => run_export(settings, args).await,
    }
}

/// Where listing and export records are read from.
struct ContentSource {
    posts: Arc<dyn PostsRepo>,
    categories: Arc<dyn CategoriesRepo>,
    db: Option<Arc<PostgresRepositories>>,
}

async fn init_source(settings: &config::Settings) -> Result<ContentSource, AppError> {
    if let Some(database_url) = settings.database.url.as_deref() {
        let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

        PostgresRepositories::run_migrations(&pool)
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

        let repositories = Arc::new(PostgresRepositories::new(pool));
        return Ok(ContentSource {
            posts: repositories.clone(),
            categories: repositories.clone(),
            db: Some(repositories),
        });
    }

    let repo = match settings.database.seed_file.as_deref() {
        Some(path) => {
            let repo = InMemoryPostsRepo::from_json_file(path).await?;
            info!(
                target = "content_archive::source",
                path = %path.display(),
                records = repo.len(),
                "loaded seed records"
            );
            repo
        }
        None => {
            warn!(
                target = "content_archive::source",
                "no database url or seed file configured; archive is empty"
            );
            InMemoryPostsRepo::new()
        }
    };

    let repo = Arc::new(repo);
    Ok(ContentSource {
        posts: repo.clone(),
        categories: repo,
        db: None,
    })
}

fn build_archive_service(
    settings: &config::Settings,
    source: &ContentSource,
    nonces: NonceGuard,
) -> ArchiveService {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache = Arc::new(MemoryCache::new(
        &CacheConfig::from(&settings.cache),
        clock.clone(),
    ));
    let archive_settings = Arc::new(InMemorySettings::new(settings.archive.clone()));
    ArchiveService::new(source.posts.clone(), cache, archive_settings, nonces, clock)
        .with_categories(source.categories.clone())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let secret = settings
        .security
        .require_nonce_secret()
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;
    let nonces = NonceGuard::new(secret, settings.security.nonce_lifetime);

    let source = init_source(&settings).await?;
    let archive = Arc::new(build_archive_service(&settings, &source, nonces));
    let router = http::build_router(ArchiveState {
        archive: archive.clone(),
        db: source.db,
    });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "content_archive::serve",
        addr = %settings.server.addr,
        "archive service listening"
    );

    let grace = settings.server.graceful_shutdown;
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(async {
        let _ = shutdown_rx.await;
    });
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut server => {
            return flatten_server_result(result);
        }
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|err| AppError::from(InfraError::from(err)))?;
        }
    }

    info!(
        target = "content_archive::serve",
        grace_secs = grace.as_secs(),
        "shutdown requested; draining connections"
    );
    let _ = shutdown_tx.send(());

    let outcome = match tokio::time::timeout(grace, &mut server).await {
        Ok(result) => flatten_server_result(result),
        Err(_) => {
            warn!(
                target = "content_archive::serve",
                "graceful shutdown timed out; aborting open connections"
            );
            server.abort();
            Ok(())
        }
    };
    archive.clear_cache();
    outcome
}

fn flatten_server_result(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::from(InfraError::server(err.to_string()))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn run_export(settings: config::Settings, args: config::ExportArgs) -> Result<(), AppError> {
    let source = init_source(&settings).await?;
    // Operator exports skip token verification, so any key will do.
    let nonces = NonceGuard::new(Uuid::new_v4().as_bytes(), settings.security.nonce_lifetime);
    let archive = build_archive_service(&settings, &source, nonces);

    let filters: HashMap<String, String> = [
        (FIELD_DATE_FROM, args.date_from),
        (FIELD_DATE_TO, args.date_to),
        (FIELD_CATEGORY, args.category),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.map(|value| (name.to_string(), value)))
    .collect();
    let display = DisplayAttributes {
        post_type: args.post_type,
        ..DisplayAttributes::default()
    };

    info!(
        target = "content_archive::export",
        path = %args.file.display(),
        format = args.format.as_str(),
        "Starting export"
    );

    let document = archive
        .generate_export(&display, &filters, args.format)
        .await?;
    tokio::fs::write(&args.file, &document.content)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "content_archive::export",
        path = %args.file.display(),
        suggested_filename = %document.filename,
        bytes = document.content.len(),
        "Export completed"
    );
    Ok(())
}
