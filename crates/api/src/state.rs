use smscore::config::Settings;
use dispatch::queue::RedisQueue;
use dispatch::retrier::RetryWorker;
use dispatch::scheduler::Scheduler;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub queue: RedisQueue,
    pub settings: Settings,
    pub scheduler: Arc<Scheduler>,
    pub retrier: Arc<RetryWorker>,
}
