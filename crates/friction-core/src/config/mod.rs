pub mod settings;

pub use settings::{FrictionConfig, Thresholds, Weights};
