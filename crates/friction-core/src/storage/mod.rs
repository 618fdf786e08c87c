pub mod files;

pub use files::OutputDir;
