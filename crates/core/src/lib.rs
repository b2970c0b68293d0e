pub mod config;
pub mod error;
pub mod token_store;
pub mod types;

pub use config::AppConfig;
pub use error::HarvestError;
pub use token_store::TokenStore;
pub use types::*;
