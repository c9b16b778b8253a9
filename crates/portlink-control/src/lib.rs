//! Control plane for connection brokering
pub mod config;
pub mod events;
pub mod manager;
pub mod pool;
pub mod response;

pub use config::BrokerConfig;
pub use events::{EventKind, EventPublisher, LifecycleEvent, PublishError, LIFECYCLE_TOPIC};
pub use manager::{
    ConnectionDetails, ConnectionManager, ConnectionSummary, STATUS_CONNECTED, STATUS_CONNECTING,
    STATUS_ERROR, STATUS_INTERRUPTED, STATUS_STOPPED,
};
pub use pool::{PoolError, PortAllocator, PortPoolStore};
pub use response::{codes, ServiceResponse};
