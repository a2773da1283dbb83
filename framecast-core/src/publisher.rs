//! Per-viewer stream publishing
//!
//! Every viewer gets its own loop: receive a frame from the session's
//! broadcast, snapshot the overlays, composite and encode on a blocking
//! thread, then hand the multipart part to the viewer's HTTP body through a
//! bounded channel. A slow viewer only ever slows itself down; when its
//! broadcast receiver falls behind, the oldest frames are dropped and counted.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::capture::{CaptureSession, SessionState, SessionStatus};
use crate::composite::{FrameCompositor, SkippedOverlay};
use crate::config::PublisherOptions;
use crate::encode::FrameEncoder;
use crate::error::FramecastError;
use crate::metrics::StreamMetrics;
use crate::overlay::OverlayProvider;
use crate::types::{EncodedChunk, FrameBuffer, ViewerId};

/// Why a viewer loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Session was not running when the viewer attached
    SessionInactive,
    /// Session was stopped
    SessionStopped,
    /// Upstream ended or failed
    EndOfStream,
    /// The viewer went away
    ViewerDisconnected,
    /// Too many consecutive encode failures
    EncodeFailures,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SessionInactive => write!(f, "session not active"),
            Self::SessionStopped => write!(f, "session stopped"),
            Self::EndOfStream => write!(f, "end of stream"),
            Self::ViewerDisconnected => write!(f, "viewer disconnected"),
            Self::EncodeFailures => write!(f, "persistent encode failures"),
        }
    }
}

/// Lifecycle of one viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerState {
    /// Attached, waiting to learn whether the session is running
    Idle,
    /// Emitting chunks
    Streaming,
    /// Terminal
    Closed(CloseReason),
}

/// A viewer attached to a session
#[derive(Debug)]
pub struct ViewerStream {
    /// Viewer id
    pub id: ViewerId,
    /// Multipart parts, in read order; closes when the viewer closes
    pub chunks: mpsc::Receiver<Bytes>,
    /// Viewer state changes
    pub state: watch::Receiver<ViewerState>,
    /// The viewer loop
    pub task: JoinHandle<CloseReason>,
}

/// Turns session frames into per-viewer JPEG streams
#[derive(Clone)]
pub struct StreamPublisher {
    overlays: Arc<dyn OverlayProvider>,
    encoder: Arc<dyn FrameEncoder>,
    compositor: FrameCompositor,
    options: PublisherOptions,
}

impl StreamPublisher {
    /// Create a publisher
    pub fn new(
        overlays: Arc<dyn OverlayProvider>,
        encoder: Arc<dyn FrameEncoder>,
        options: PublisherOptions,
    ) -> Self {
        Self {
            overlays,
            encoder,
            compositor: FrameCompositor::new(),
            options,
        }
    }

    /// Viewer loop options
    pub fn options(&self) -> &PublisherOptions {
        &self.options
    }

    /// Attach a viewer to a session
    ///
    /// Subscribes before returning, so no frame read after this call is
    /// missed. If the session is not running the viewer is closed at once
    /// and `chunks` yields nothing. Must be called within a Tokio runtime.
    pub fn attach(&self, session: &CaptureSession) -> ViewerStream {
        let id = ViewerId::new();
        let (tx, chunks) = mpsc::channel(self.options.viewer_queue.max(1));
        let (state_tx, state) = watch::channel(ViewerState::Idle);

        let frames = session.subscribe_frames();
        let mut status = session.watch_status();
        let active = status.borrow_and_update().is_active();

        if !active {
            debug!("{} attached to inactive session {}", id, session.id());
            state_tx.send_replace(ViewerState::Closed(CloseReason::SessionInactive));
            drop(tx);
            return ViewerStream {
                id,
                chunks,
                state,
                task: tokio::spawn(async { CloseReason::SessionInactive }),
            };
        }

        let viewer = ViewerLoop {
            id,
            publisher: self.clone(),
            metrics: Arc::clone(session.metrics()),
            frames,
            status,
            tx,
            state: state_tx,
            consecutive_failures: 0,
            last_skipped: Vec::new(),
        };

        ViewerStream {
            id,
            chunks,
            state,
            task: tokio::spawn(viewer.run()),
        }
    }
}

impl std::fmt::Debug for StreamPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPublisher")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Result of compositing and encoding one frame off the async runtime
struct Rendered {
    skipped: Vec<SkippedOverlay>,
    encoded: crate::error::Result<EncodedChunk>,
}

struct ViewerLoop {
    id: ViewerId,
    publisher: StreamPublisher,
    metrics: Arc<StreamMetrics>,
    frames: broadcast::Receiver<Arc<FrameBuffer>>,
    status: watch::Receiver<SessionStatus>,
    tx: mpsc::Sender<Bytes>,
    state: watch::Sender<ViewerState>,
    consecutive_failures: u32,
    last_skipped: Vec<SkippedOverlay>,
}

impl ViewerLoop {
    async fn run(mut self) -> CloseReason {
        let _guard = self.metrics.viewer_guard();
        self.state.send_replace(ViewerState::Streaming);
        info!("{} streaming", self.id);

        let reason = loop {
            tokio::select! {
                biased;

                _ = self.tx.closed() => break CloseReason::ViewerDisconnected,

                changed = self.status.changed() => {
                    if let Some(reason) = inactive_reason(changed, &mut self.status) {
                        break reason;
                    }
                }

                received = self.frames.recv() => match received {
                    Ok(frame) => {
                        if let Err(reason) = self.publish(frame).await {
                            break reason;
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        debug!("{} lagged, dropped {} frame(s)", self.id, missed);
                        self.metrics.record_frames_dropped(missed);
                    }
                    Err(RecvError::Closed) => break CloseReason::EndOfStream,
                },
            }
        };

        self.state.send_replace(ViewerState::Closed(reason));
        info!("{} closed: {}", self.id, reason);
        reason
    }

    /// Composite, encode and deliver one frame
    async fn publish(&mut self, frame: Arc<FrameBuffer>) -> Result<(), CloseReason> {
        let sequence = frame.sequence;
        let overlays = self.publisher.overlays.snapshot();
        let compositor = self.publisher.compositor;
        let encoder = Arc::clone(&self.publisher.encoder);
        let metrics = Arc::clone(&self.metrics);

        let rendered = tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let composited = compositor.composite(Arc::unwrap_or_clone(frame), &overlays);
            metrics.record_composite(started.elapsed());

            let started = Instant::now();
            let encoded = encoder.encode(&composited.frame);
            metrics.record_encode(started.elapsed());

            Rendered {
                skipped: composited.skipped,
                encoded,
            }
        })
        .await;

        let rendered = match rendered {
            Ok(rendered) => rendered,
            Err(e) => Rendered {
                skipped: Vec::new(),
                encoded: Err(FramecastError::encode(format!("Render task failed: {}", e))),
            },
        };

        self.note_skipped(rendered.skipped);

        let chunk = match rendered.encoded {
            Ok(chunk) => {
                self.consecutive_failures = 0;
                chunk
            }
            Err(e) => {
                self.consecutive_failures += 1;
                self.metrics.record_encode_failure();
                if self.consecutive_failures == 1 {
                    warn!("{} dropped frame {}: {}", self.id, sequence, e);
                } else {
                    debug!("{} dropped frame {}: {}", self.id, sequence, e);
                }
                if self.consecutive_failures >= self.publisher.options.max_consecutive_encode_failures {
                    return Err(CloseReason::EncodeFailures);
                }
                return Ok(());
            }
        };

        self.deliver(chunk.to_multipart()).await?;
        self.metrics.record_chunk_emitted();
        Ok(())
    }

    /// Wait for room in the viewer queue, still honouring session stop
    async fn deliver(&mut self, part: Bytes) -> Result<(), CloseReason> {
        loop {
            tokio::select! {
                biased;

                permit = self.tx.reserve() => {
                    let permit = permit.map_err(|_| CloseReason::ViewerDisconnected)?;
                    permit.send(part);
                    return Ok(());
                }

                changed = self.status.changed() => {
                    if let Some(reason) = inactive_reason(changed, &mut self.status) {
                        return Err(reason);
                    }
                }
            }
        }
    }

    /// Log skipped overlays when the set changes, count them always
    fn note_skipped(&mut self, skipped: Vec<SkippedOverlay>) {
        if skipped.is_empty() {
            self.last_skipped.clear();
            return;
        }

        self.metrics.record_overlays_skipped(skipped.len() as u64);
        if skipped != self.last_skipped {
            for skip in &skipped {
                warn!("{} skipping overlay {}: {}", self.id, skip.index, skip.error);
            }
            self.last_skipped = skipped;
        }
    }
}

/// Close reason for a status change, or `None` while still running
fn inactive_reason(
    changed: Result<(), watch::error::RecvError>,
    status: &mut watch::Receiver<SessionStatus>,
) -> Option<CloseReason> {
    if changed.is_err() {
        return Some(CloseReason::EndOfStream);
    }
    match &status.borrow_and_update().state {
        SessionState::Running { .. } => None,
        SessionState::Idle | SessionState::Stopping => Some(CloseReason::SessionStopped),
        SessionState::Ended { .. } => Some(CloseReason::EndOfStream),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_reason() {
        let (tx, mut rx) = watch::channel(SessionStatus {
            generation: 1,
            state: SessionState::Running { source: "a".into() },
        });
        assert_eq!(inactive_reason(Ok(()), &mut rx), None);

        tx.send_replace(SessionStatus {
            generation: 1,
            state: SessionState::Stopping,
        });
        assert_eq!(inactive_reason(Ok(()), &mut rx), Some(CloseReason::SessionStopped));

        tx.send_replace(SessionStatus {
            generation: 1,
            state: SessionState::Ended { reason: "eof".into() },
        });
        assert_eq!(inactive_reason(Ok(()), &mut rx), Some(CloseReason::EndOfStream));
    }
}
