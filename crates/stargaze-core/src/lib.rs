pub mod config;
pub mod error;
pub mod types;

pub use config::StargazeConfig;
pub use error::{Result, StargazeError};
pub use types::*;
