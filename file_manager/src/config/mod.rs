//! Application configuration, loaded once at startup.

mod settings;

pub use settings::{AppConfig, FileConfig, LinkStyle, ServerConfig, StorageLayout};
