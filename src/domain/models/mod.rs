pub mod config;
pub mod event;
pub mod headers;
pub mod query;

pub use config::{
    AllowlistConfig, Config, DatabaseConfig, ForwarderConfig, LoggingConfig, ReplayConfig,
    StatsConfig,
};
pub use event::{Event, MAX_ID_LEN, MAX_NAME_LEN};
pub use headers::{HeaderSet, DELIVERY_HEADER, EVENT_TYPE_HEADER, SIGNATURE_HEADER};
pub use query::{EventPage, EventQuery, StoreOutcome};
