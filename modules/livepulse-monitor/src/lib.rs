pub mod admission;
pub mod backoff;
pub mod client;
pub mod dedup;
pub mod orchestrator;
pub mod rate_limit;
pub mod replay;
pub mod reporter;
pub mod shutdown;
pub mod sink;
pub mod stats;
pub mod store;

pub use admission::AdmissionGate;
pub use client::{StreamClient, StreamEvent, StreamSession};
pub use dedup::Deduplicator;
pub use orchestrator::{MonitorDeps, TargetMonitor, TargetState};
pub use rate_limit::RateLimitState;
pub use replay::ReplayClient;
pub use reporter::StatusReporter;
pub use shutdown::ShutdownCoordinator;
pub use sink::{EventSink, FileSink};
pub use stats::StatsRegistry;
pub use store::SnapshotStore;
