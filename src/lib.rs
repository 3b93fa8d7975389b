pub mod config;
pub mod error;
pub mod http_client;
pub mod persist;
pub mod pipeline;
pub mod players;
pub mod provider;
pub mod shots;
pub mod table;
