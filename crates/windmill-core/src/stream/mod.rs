//! Real-time fan-out of readings to live subscribers.
//!
//! # Architecture
//!
//! ```text
//!   ingest handler                         Arc<Registry>
//!        │                        ┌───────────────────────────┐
//!        │ after durable write    │ device_id -> [ChannelSender]│
//!        ▼                        └─────────────┬─────────────┘
//!   Publisher::broadcast ── snapshot ──────────┘
//!        │
//!        ├── try_push ──► ChannelReceiver ──► StreamSession ──► FrameSink (SSE)
//!        └── try_push ──► ChannelReceiver ──► StreamSession ──► FrameSink (SSE)
//! ```
//!
//! The registry lock covers only the map. Delivery happens on a snapshot
//! with non-blocking pushes, so ingestion never waits on a slow viewer.
//! A full channel drops the newest event and keeps what is already queued.

mod channel;
mod config;
mod publisher;
mod registry;
mod session;

pub use channel::{channel, ChannelId, ChannelReceiver, ChannelSender, Offer, Popped};
pub use config::{StreamConfig, DEFAULT_CHANNEL_CAPACITY, DEFAULT_IDLE_INTERVAL};
pub use publisher::{BroadcastOutcome, Publisher};
pub use registry::{Registry, SharedRegistry};
pub use session::{
    CloseReason, Frame, FrameSink, SessionState, SessionSummary, SinkClosed, StreamSession,
};
