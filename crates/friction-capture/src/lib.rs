pub mod error;
pub mod import;
pub mod signals;

pub use error::CaptureError;
pub use import::claude_code::{derive_session_name, load_session};
pub use import::discover::{discover_sessions, find_session_file, project_parents};
pub use signals::extractor::SignalExtractor;
