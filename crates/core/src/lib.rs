pub mod config;
pub mod error;
pub mod source;
pub mod types;

pub use config::EngineConfig;
pub use error::{RetentionError, RetentionResult};
pub use source::{InMemoryDataSource, MerchantDataset, RetentionDataSource};
