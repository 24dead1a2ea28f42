//! Live reading stream over server-sent events.

use std::convert::Infallible;

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::{HeaderName, HeaderValue},
    response::{
        sse::{Event as SseEvent, Sse},
        IntoResponse,
    },
    routing::get,
    Router,
};
use futures::stream::{self, Stream};
use serde_json::json;
use tokio::sync::mpsc;
use windmill_core::stream::SinkClosed;
use windmill_core::{Frame, FrameSink, StreamSession};

use crate::error::AppError;
use crate::json::DeviceParams;
use crate::AppState;

/// Stream routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/stream", get(stream_readings))
}

/// Open a live stream of one device's readings.
async fn stream_readings(
    State(state): State<AppState>,
    Query(params): Query<DeviceParams>,
) -> Result<impl IntoResponse, AppError> {
    let device_id = params.require()?;
    tracing::debug!(device_id = %device_id, "stream client connected");

    let (tx, rx) = mpsc::channel(1);
    let session = StreamSession::new(
        state.registry.clone(),
        device_id,
        state.config.stream.clone(),
    );
    tokio::spawn(session.run(SseSink { tx }));

    Ok((
        [(
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        )],
        Sse::new(event_stream(rx)),
    ))
}

/// Drain encoded frames until the session drops its sender.
fn event_stream(
    rx: mpsc::Receiver<Result<SseEvent, Infallible>>,
) -> impl Stream<Item = Result<SseEvent, Infallible>> {
    stream::unfold(rx, |mut rx| async move {
        let item = rx.recv().await?;
        Some((item, rx))
    })
}

/// Hands session frames to the response body.
struct SseSink {
    tx: mpsc::Sender<Result<SseEvent, Infallible>>,
}

#[async_trait]
impl FrameSink for SseSink {
    async fn send(&mut self, frame: Frame) -> Result<(), SinkClosed> {
        let payload = match FramePayload::encode(&frame) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(kind = frame.kind(), error = %err, "skipping unencodable frame");
                return Ok(());
            }
        };

        self.tx
            .send(Ok(payload.into()))
            .await
            .map_err(|_| SinkClosed)
    }
}

/// Wire form of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FramePayload {
    /// `data:` line.
    Data(String),
    /// `:` comment line.
    Comment(String),
}

impl FramePayload {
    fn encode(frame: &Frame) -> serde_json::Result<Self> {
        match frame {
            Frame::Connected { device_id } => Ok(FramePayload::Data(
                json!({ "type": "connected", "device_id": device_id }).to_string(),
            )),
            Frame::Data(event) => Ok(FramePayload::Data(serde_json::to_string(&**event)?)),
            Frame::Keepalive { at } => Ok(FramePayload::Comment(format!(
                "keepalive {}",
                at.to_rfc3339()
            ))),
        }
    }
}

impl From<FramePayload> for SseEvent {
    fn from(payload: FramePayload) -> Self {
        match payload {
            FramePayload::Data(data) => SseEvent::default().data(data),
            FramePayload::Comment(comment) => SseEvent::default().comment(comment),
        }
    }
}
