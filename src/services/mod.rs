//! Service layer: ingestion, forwarding, replay and the background workers.

pub mod delivery;
pub mod forwarder;
pub mod ingestion;
pub mod metrics;
pub mod origin_allowlist;
pub mod replay;
pub mod signal;
pub mod signature;
pub mod stats_collector;

pub use delivery::{ForwardError, ForwardTarget};
pub use forwarder::{Forwarder, SweepReport};
pub use ingestion::{InboundDelivery, IngestError, IngestOutcome, IngestionService};
pub use metrics::RelayMetrics;
pub use origin_allowlist::{AllowlistError, Cidr, OriginAllowlist};
pub use replay::{ReplayError, ReplayRange, ReplayService};
pub use signal::{CoalescedSignal, SignalReceiver};
pub use stats_collector::StatsCollector;
