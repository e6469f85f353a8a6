pub mod config;
pub mod error;
pub mod types;

pub use config::GovcastConfig;
pub use error::{GovcastError, Result};
pub use types::{Channel, ChannelCategory};
