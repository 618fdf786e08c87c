pub mod config;
pub mod error;
pub mod model;
pub mod storage;
pub mod text;

pub use config::FrictionConfig;
pub use error::CoreError;
