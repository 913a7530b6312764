pub mod audit;
pub mod config;
pub mod store;

pub use audit::{FanoutSink, JsonLinesSink, TracingSink};
pub use config::AppConfig;
pub use store::{FileStore, MemoryStore};
