use axum::Router;
use smscore::config::Settings;
use dispatch::queue::RedisQueue;
use dispatch::retrier::RetryWorker;
use dispatch::scheduler::Scheduler;
use dispatch::DispatchState;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

mod error;
mod routes;
mod state;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let settings = Settings::from_env()?;

    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&settings.database_url)
        .await?;

    let queue = RedisQueue::new(redis::Client::open(settings.redis_url.clone())?);

    let dispatch_state = DispatchState {
        db: db.clone(),
        queue: queue.clone(),
        settings: settings.clone(),
    };

    let scheduler = Scheduler::new(dispatch_state.clone());
    let retrier = RetryWorker::new(dispatch_state);
    scheduler.start();
    retrier.start();

    let state = AppState {
        db,
        queue,
        settings: settings.clone(),
        scheduler,
        retrier,
    };

    let app = Router::new()
        .merge(routes::health_router(state.clone()))
        .merge(routes::v1_router(state));

    let addr: SocketAddr = settings.api_bind.parse()?;
    info!(%addr, "starting api");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
