//! The campaign delivery pipeline: queue client, dispatch batcher,
//! scheduler/poller and the retry subsystem.

pub mod assets;
pub mod batcher;
pub mod queue;
pub mod retrier;
pub mod scheduler;

use smscore::config::Settings;
use queue::RedisQueue;

/// Shared handles for every pipeline component.
#[derive(Clone)]
pub struct DispatchState {
    pub db: sqlx::PgPool,
    pub queue: RedisQueue,
    pub settings: Settings,
}
