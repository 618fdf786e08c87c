pub mod aggregate;
pub mod analysis;
pub mod antigen;
pub mod event;
pub mod signal;

pub use aggregate::{
    AggregateSummary, Correlations, DailyStats, GroupStats, SessionPointer, SignalCount,
    SourceAggregate, Verdict, VerdictStatus,
};
pub use analysis::{
    FrictionSummary, Momentum, Pattern, Quality, SessionAnalysis, SessionMetadata, SignalStats,
    SourceStats,
};
pub use antigen::{AntigenCandidate, AntigenCluster, INHIBITORY_PLACEHOLDER};
pub use event::{parse_events, parse_timestamp, ContentBlock, EventBody, MessageContent, SessionEvent};
pub use signal::{Signal, SignalKind, Source};
