//! Windmill Monitor core.
//!
//! Live fan-out of device readings to streaming subscribers, plus the
//! sled-backed store that readings are persisted to before they are
//! broadcast.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod error;
pub mod event;
pub mod reading;
pub mod storage;
pub mod stream;

pub use error::{Error, Result};
pub use event::{Event, MetricValue, Metrics, METRIC_NAMES};
pub use reading::Reading;
pub use storage::{DeviceSummary, ReadingStore, StoredReading};
pub use stream::{
    BroadcastOutcome, ChannelId, Frame, FrameSink, Publisher, Registry, SharedRegistry,
    StreamConfig, StreamSession,
};
