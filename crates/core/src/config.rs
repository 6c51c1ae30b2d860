use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub redis_url: String,
    pub courier_env: String,
    pub api_bind: String,
    pub scheduler_interval_secs: u64,
    pub retry_interval_secs: u64,
    pub max_retry_count: i32,
    pub dispatch_queue: String,
    pub asset_queue: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, std::env::VarError> {
        let database_url =
            std::env::var("DATABASE_URL").or_else(|_| std::env::var("COURIER_DATABASE_URL"))?;
        let redis_url =
            std::env::var("REDIS_URL").or_else(|_| std::env::var("COURIER_REDIS_URL"))?;
        let courier_env = std::env::var("COURIER_ENV").unwrap_or_else(|_| "dev".to_string());
        let api_bind =
            std::env::var("COURIER_API_BIND").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let scheduler_interval_secs = std::env::var("COURIER_SCHEDULER_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        let retry_interval_secs = std::env::var("COURIER_RETRY_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300);
        let max_retry_count = std::env::var("COURIER_MAX_RETRY_COUNT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);
        let dispatch_queue =
            std::env::var("COURIER_DISPATCH_QUEUE").unwrap_or_else(|_| "dispatch".to_string());
        let asset_queue = std::env::var("COURIER_ASSET_QUEUE")
            .unwrap_or_else(|_| "asset-generation".to_string());

        Ok(Self {
            database_url,
            redis_url,
            courier_env,
            api_bind,
            scheduler_interval_secs,
            retry_interval_secs,
            max_retry_count,
            dispatch_queue,
            asset_queue,
        })
    }
}
