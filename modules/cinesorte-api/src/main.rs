use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cinesorte_api::{router, AppState};
use cinesorte_common::Config;
use cinesorte_engine::{alerts_from_config, Cinesorte};
use cinesorte_store::PgStore;
use identity_client::IdentityClient;
use tmdb_client::TmdbClient;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("cinesorte=info".parse()?);
    // LOG_FORMAT=json for log shippers, human-readable otherwise.
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    let store = PgStore::new(pool);
    store.migrate().await?;

    let engine = Cinesorte::builder()
        .store(Arc::new(store))
        .catalog(Arc::new(TmdbClient::with_base_url(
            config.tmdb_api_key.clone(),
            config.tmdb_base_url.clone(),
        )))
        .identity(Arc::new(IdentityClient::new(
            config.identity_api_key.clone(),
            config.identity_admin_token.clone(),
        )))
        .alerts(alerts_from_config(&config))
        .build();

    let state = Arc::new(AppState::from_config(engine, &config)?);
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Cinesorte API starting on {addr} ({:?})", config.app_env);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
