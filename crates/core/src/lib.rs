pub mod config;
pub mod lifecycle;
pub mod payload;
pub mod phone;
pub mod resolver;
pub mod retry;
pub mod types;
