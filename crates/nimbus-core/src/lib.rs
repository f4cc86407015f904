pub mod config;
pub mod types;

pub use config::NimbusConfig;
pub use types::*;
