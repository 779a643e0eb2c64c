use std::process;
use std::sync::Arc;

use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::net::TcpListener;

use money_tracker::{
    app::{build_router, Stores},
    config::Config,
    db::{
        account::AccountRepository, auth::AuthRepository, currency::CurrencyRepository,
        tx::TransactionRepository, user::UserRepository,
    },
    rates::HexarateClient,
    routes::auth::TokenSettings,
    telemetry,
};

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            process::exit(1);
        }
    };

    let _guards = match telemetry::init(&config.log_file) {
        Ok(guards) => guards,
        Err(err) => {
            eprintln!("Unable to set global subscriber: {err}");
            process::exit(1);
        }
    };

    let database_pool =
        match process_database(&config.database_url, config.max_connection_pooling).await {
            Ok(db) => {
                tracing::info!("Connected to database");
                db
            }
            Err(err) => {
                tracing::error!("Failed to connect to database: {}", err);
                process::exit(1);
            }
        };

    let listener = match TcpListener::bind(("0.0.0.0", config.port)).await {
        Ok(listener) => {
            tracing::info!("Listening on port: {}", config.port);
            listener
        }
        Err(err) => {
            tracing::error!("Failed to bind to port: {}", err);
            process::exit(1);
        }
    };

    let stores = Stores {
        users: Arc::new(UserRepository::new(database_pool.clone())),
        refresh_tokens: Arc::new(AuthRepository::new(database_pool.clone())),
        ledger: Arc::new(AccountRepository::new(database_pool.clone())),
        currencies: Arc::new(CurrencyRepository::new(database_pool.clone())),
        transactions: Arc::new(TransactionRepository::new(database_pool.clone())),
        posting: Arc::new(TransactionRepository::new(database_pool.clone())),
    };
    let router = build_router(
        stores,
        Arc::new(HexarateClient::new(config.rate_api_url.clone())),
        TokenSettings {
            jwt_secret: config.jwt_secret.clone(),
            access_token_ttl: config.access_token_ttl,
            refresh_token_ttl: config.refresh_token_ttl,
        },
    );
    tracing::info!("Routes constructed successfully");

    //start the http service
    let http_service = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal());
    if let Err(err) = http_service.await {
        tracing::error!("Failed to start server: {}", err);
        process::exit(1);
    }

    database_pool.close().await;
    tracing::info!("Server stopped");
}

async fn process_database(url: &str, max_conn_pool: u32) -> Result<PgPool, sqlx::Error> {
    let db_pool = PgPoolOptions::new()
        .max_connections(max_conn_pool)
        .connect(url)
        .await?;

    match sqlx::migrate!("./migrations").run(&db_pool).await {
        Ok(_) => tracing::info!("Migrations run successfully"),
        // assume the database is already migrated and keep going
        Err(err) => tracing::warn!("Failed to run migrations: {err}"),
    }

    Ok(db_pool)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {err}");
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
    tracing::info!("Shutdown signal received");
}
