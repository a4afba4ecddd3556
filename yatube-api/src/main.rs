use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yatube_api::{
    config::Env,
    server::{self, ServerState, cache::PageCache, templates},
};
use yatube_common::paginator::Paginator;
use yatube_db::{DbClient, DbError, MemoryStore, Store};

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error loading templates: {0}")]
    Templates(&'static tera::Error),
    #[error("Error connecting to the database: {0}")]
    DbConnect(#[from] sqlx::Error),
    #[error("Error migrating the database: {0}")]
    DbMigrate(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "yatube_api=debug,yatube_common=debug,yatube_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn connect_store(env: &Env) -> Result<Arc<dyn Store>, InitError> {
    let Some(database_url) = &env.database_url else {
        warn!("DATABASE_URL is not set, posts are kept in memory only");
        return Ok(Arc::new(MemoryStore::new(env.worker_id, env.process_id)));
    };

    let pool = PgPool::connect(database_url).await?;
    let client = DbClient::new(pool, env.worker_id, env.process_id);
    client.migrate().await?;
    debug!("Database is migrated");

    Ok(Arc::new(client))
}

async fn shutdown_on_ctrl_c(token: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Could not listen for ctrl-c");
        return;
    }

    info!("Shutting down");
    token.cancel();
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;
    debug!(
        count_post_page = %env.count_post_page,
        index_cache_seconds = env.index_cache_seconds,
        "Loaded configuration"
    );

    templates::engine().map_err(InitError::Templates)?;

    let state = ServerState {
        store: connect_store(&env).await?,
        paginator: Paginator::new(env.count_post_page),
        index_cache: PageCache::new(env.index_cache_ttl()),
    };

    let tracing_layer = TraceLayer::new_for_http();
    let app = server::routes().layer(tracing_layer).with_state(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_on_ctrl_c(shutdown.clone()));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
