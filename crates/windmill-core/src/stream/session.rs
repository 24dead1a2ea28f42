//! Per-connection streaming session.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;

use super::channel::{channel, ChannelId, ChannelReceiver, Popped};
use super::config::StreamConfig;
use super::registry::SharedRegistry;
use crate::event::Event;

/// A frame emitted to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// First frame of every session.
    Connected { device_id: String },
    /// A new reading.
    Data(Arc<Event>),
    /// Idle marker carrying only the server time.
    Keepalive { at: DateTime<Utc> },
}

impl Frame {
    /// Short name of the frame kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Connected { .. } => "connected",
            Frame::Data(_) => "data",
            Frame::Keepalive { .. } => "keepalive",
        }
    }
}

/// The subscriber connection is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("subscriber disconnected")]
pub struct SinkClosed;

/// Destination of session frames. A failed send ends the session.
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: Frame) -> Result<(), SinkClosed>;
}

#[async_trait]
impl FrameSink for mpsc::Sender<Frame> {
    async fn send(&mut self, frame: Frame) -> Result<(), SinkClosed> {
        mpsc::Sender::send(self, frame).await.map_err(|_| SinkClosed)
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Streaming,
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// A frame could not be written to the subscriber.
    Disconnected,
    /// The registry released the channel.
    Shutdown,
}

/// What a finished session did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub channel_id: ChannelId,
    pub reason: CloseReason,
    pub data_frames: u64,
    pub keepalives: u64,
    pub duration: Duration,
}

/// Streams readings for one device to one subscriber.
///
/// `Init` registers a fresh channel and sends `connected`. `Streaming`
/// waits on the channel for at most the idle interval and sends a data or
/// keepalive frame. `Closed` unregisters and releases the channel; it is
/// entered once, either when [`StreamSession::run`] returns or when the
/// session is dropped mid-stream.
pub struct StreamSession {
    device_id: String,
    registry: SharedRegistry,
    config: StreamConfig,
    channel: Option<ChannelReceiver>,
    channel_id: Option<ChannelId>,
    state: SessionState,
    data_frames: u64,
    keepalives: u64,
    opened_at: Instant,
}

impl StreamSession {
    /// Create a session. Nothing is registered until it runs.
    pub fn new(registry: SharedRegistry, device_id: impl Into<String>, config: StreamConfig) -> Self {
        Self {
            device_id: device_id.into(),
            registry,
            config,
            channel: None,
            channel_id: None,
            state: SessionState::Init,
            data_frames: 0,
            keepalives: 0,
            opened_at: Instant::now(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Channel of this session, once registered.
    pub fn channel_id(&self) -> Option<ChannelId> {
        self.channel_id
    }

    /// Run until the subscriber disconnects or the channel is released.
    pub async fn run<S: FrameSink>(mut self, mut sink: S) -> SessionSummary {
        let channel_id = self.open();
        let reason = self.stream(&mut sink).await;
        self.close();

        let summary = SessionSummary {
            channel_id,
            reason,
            data_frames: self.data_frames,
            keepalives: self.keepalives,
            duration: self.opened_at.elapsed(),
        };

        tracing::info!(
            device_id = %self.device_id,
            %channel_id,
            reason = ?reason,
            data_frames = summary.data_frames,
            keepalives = summary.keepalives,
            "stream session closed"
        );

        summary
    }

    fn open(&mut self) -> ChannelId {
        let channel_id = self.registry.next_channel_id();
        let (sender, receiver) = channel(channel_id, self.config.channel_capacity);
        self.registry.register(&self.device_id, sender);
        self.channel = Some(receiver);
        self.channel_id = Some(channel_id);
        self.opened_at = Instant::now();

        tracing::info!(device_id = %self.device_id, %channel_id, "stream session opened");
        channel_id
    }

    async fn stream<S: FrameSink>(&mut self, sink: &mut S) -> CloseReason {
        let connected = Frame::Connected {
            device_id: self.device_id.clone(),
        };
        if sink.send(connected).await.is_err() {
            return CloseReason::Disconnected;
        }
        self.state = SessionState::Streaming;

        let idle_interval = self.config.idle_interval;
        loop {
            let Some(receiver) = self.channel.as_mut() else {
                return CloseReason::Shutdown;
            };

            let frame = match receiver.pop(idle_interval).await {
                Popped::Event(event) => Frame::Data(event),
                Popped::Timeout => Frame::Keepalive { at: Utc::now() },
                Popped::Closed => return CloseReason::Shutdown,
            };

            let is_data = matches!(frame, Frame::Data(_));
            if sink.send(frame).await.is_err() {
                return CloseReason::Disconnected;
            }

            if is_data {
                self.data_frames += 1;
            } else {
                self.keepalives += 1;
            }
        }
    }

    fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;

        if let Some(channel_id) = self.channel_id {
            self.registry.unregister(&self.device_id, channel_id);
        }
        self.channel = None;
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.close();
    }
}
