pub mod aggregate;
pub mod analyze;
pub mod antigen;
pub mod cluster;
pub mod stats;

pub use aggregate::aggregate_sessions;
pub use analyze::analyze_session;
pub use antigen::extract_candidates;
pub use cluster::cluster_candidates;
