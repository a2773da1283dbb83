//! Capture session lifecycle
//!
//! A session owns at most one upstream connection at a time. The connection
//! lives on a dedicated worker thread that performs the blocking reads and
//! fans frames out through a bounded broadcast channel; start and stop only
//! coordinate with that worker and never read frames themselves.
//!
//! ```text
//!   start(url) ──► control lock ──► join old worker (releases handle)
//!                                   └─► spawn worker ──► open(url) on worker
//!                                                        │
//!   worker: read_frame() ─► Arc<FrameBuffer> ─► broadcast ─► viewers
//!   status: watch<SessionStatus> (generation-tagged)
//! ```

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, trace, warn};

use super::CaptureBackend;
use crate::error::{FramecastError, Result};
use crate::metrics::StreamMetrics;
use crate::types::{FrameBuffer, SessionId};

/// Lifecycle state of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// No upstream connection
    Idle,
    /// Worker is reading from `source`
    Running { source: String },
    /// Stop requested; worker is finishing its in-flight read
    Stopping,
    /// Upstream ended or failed on its own
    Ended { reason: String },
}

impl SessionState {
    /// Short name for logs and the status endpoint
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running { .. } => "running",
            Self::Stopping => "stopping",
            Self::Ended { .. } => "ended",
        }
    }
}

/// Session state tagged with the worker generation that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// Bumped on every worker spawn; stale workers never overwrite newer status
    pub generation: u64,
    /// Current state
    pub state: SessionState,
}

impl SessionStatus {
    /// Whether frames are flowing
    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Running { .. })
    }

    /// Source being read, when running
    pub fn source(&self) -> Option<&str> {
        match &self.state {
            SessionState::Running { source } => Some(source),
            _ => None,
        }
    }
}

/// Successful start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartAck {
    /// Generation of the new worker
    pub generation: u64,
    /// Source now being read
    pub source: String,
}

/// Outcome of a stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopAck {
    /// A running worker was told to stop
    Stopped,
    /// Nothing was running
    AlreadyStopped,
}

/// Instruction from the control side to a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum WorkerSignal {
    /// Keep reading
    Run = 0,
    /// Session stop: publish `Idle` on exit
    Stop = 1,
    /// Being replaced by a new start: leave status to the successor
    Replace = 2,
}

impl WorkerSignal {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Stop,
            2 => Self::Replace,
            _ => Self::Run,
        }
    }
}

/// State shared between the session and its workers
struct Shared {
    status: watch::Sender<SessionStatus>,
    frames: broadcast::Sender<Arc<FrameBuffer>>,
    sequence: AtomicU64,
    metrics: Arc<StreamMetrics>,
}

/// A spawned capture worker
struct Worker {
    generation: u64,
    source: String,
    signal: Arc<AtomicU8>,
    thread: JoinHandle<()>,
}

impl Worker {
    fn signal(&self, signal: WorkerSignal) {
        self.signal.store(signal as u8, Ordering::SeqCst);
    }

    fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    fn join(self) {
        if self.thread.join().is_err() {
            error!("Capture worker for {} panicked", self.source);
        }
    }
}

/// Control-side bookkeeping, guarded by the control mutex
#[derive(Default)]
struct Control {
    worker: Option<Worker>,
    /// Stopped workers still finishing their in-flight read
    retired: Vec<Worker>,
    next_generation: u64,
}

impl Control {
    /// Join retired workers that have already exited
    fn reap(&mut self) {
        let (done, pending): (Vec<_>, Vec<_>) = self.retired.drain(..).partition(Worker::is_finished);
        self.retired = pending;
        for worker in done {
            worker.join();
        }
    }

    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}

/// One upstream capture with its worker, status and frame fan-out
pub struct CaptureSession {
    id: SessionId,
    backend: Arc<dyn CaptureBackend>,
    shared: Arc<Shared>,
    control: Mutex<Control>,
}

impl CaptureSession {
    /// Create an idle session
    ///
    /// `frame_queue` bounds the broadcast buffer; lagging viewers lose the
    /// oldest frames beyond it.
    pub fn new(id: SessionId, backend: Arc<dyn CaptureBackend>, frame_queue: usize) -> Self {
        let (frames, _) = broadcast::channel(frame_queue.max(1));
        let (status, _) = watch::channel(SessionStatus {
            generation: 0,
            state: SessionState::Idle,
        });

        Self {
            id,
            backend,
            shared: Arc::new(Shared {
                status,
                frames,
                sequence: AtomicU64::new(0),
                metrics: Arc::new(StreamMetrics::new()),
            }),
            control: Mutex::new(Control::default()),
        }
    }

    /// Session id
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Start reading from `source`
    ///
    /// Any open connection is released before the new one is opened. If the
    /// new source cannot be opened and a previous source was running, the
    /// previous source is re-opened so the session is left as it was; if that
    /// also fails the session ends.
    ///
    /// Blocks on the upstream open and on the previous worker's in-flight
    /// read, so async callers should run it on a blocking thread.
    pub fn start(&self, source: &str) -> Result<StartAck> {
        let source = source.trim();
        if source.is_empty() {
            return Err(FramecastError::validation("RTSP URL is required"));
        }

        let mut control = self.control.lock();
        control.reap();

        let previous = control.worker.take().map(|worker| {
            let running = {
                let status = self.shared.status.borrow();
                status.generation == worker.generation && status.is_active()
            };
            let source = running.then(|| worker.source.clone());
            worker.signal(WorkerSignal::Replace);
            worker.join();
            source
        });
        let previous = previous.flatten();

        // Stopped workers may still hold a connection
        for worker in control.retired.drain(..) {
            worker.join();
        }

        match self.spawn_worker(&mut control, source) {
            Ok(worker) => {
                let ack = StartAck {
                    generation: worker.generation,
                    source: source.to_string(),
                };
                info!(
                    "Session {} started on {} (generation {})",
                    self.id, source, ack.generation
                );
                control.worker = Some(worker);
                Ok(ack)
            }
            Err(err) => {
                warn!("Session {} failed to open {}: {}", self.id, source, err);

                if let Some(previous) = previous {
                    match self.spawn_worker(&mut control, &previous) {
                        Ok(worker) => {
                            info!("Session {} restored on {}", self.id, previous);
                            control.worker = Some(worker);
                        }
                        Err(restore_err) => {
                            error!(
                                "Session {} could not restore {}: {}",
                                self.id, previous, restore_err
                            );
                            let generation = control.bump_generation();
                            self.shared.status.send_replace(SessionStatus {
                                generation,
                                state: SessionState::Ended {
                                    reason: restore_err.to_string(),
                                },
                            });
                        }
                    }
                }

                if err.is_stream_open() {
                    Err(err)
                } else {
                    Err(FramecastError::stream_open(source, err.to_string()))
                }
            }
        }
    }

    /// Ask the worker to stop without waiting for it
    ///
    /// The status moves to `Stopping` immediately; the worker releases the
    /// connection after its in-flight read and publishes `Idle`. Stopping a
    /// session that is not running is a successful no-op.
    pub fn stop(&self) -> StopAck {
        let mut control = self.control.lock();
        control.reap();

        let worker = control.worker.take();
        let generation = worker.as_ref().map(|w| w.generation);
        if let Some(worker) = worker {
            // Signal before inspecting status so an exiting worker sees it
            worker.signal(WorkerSignal::Stop);
            control.retired.push(worker);
        }

        let mut stopped = false;
        self.shared.status.send_if_modified(|status| match status.state {
            SessionState::Running { .. } if Some(status.generation) == generation => {
                status.state = SessionState::Stopping;
                stopped = true;
                true
            }
            SessionState::Ended { .. } => {
                status.state = SessionState::Idle;
                true
            }
            _ => false,
        });

        if stopped {
            info!("Session {} stopping", self.id);
            StopAck::Stopped
        } else {
            debug!("Session {} already stopped", self.id);
            StopAck::AlreadyStopped
        }
    }

    /// Stop and wait for every worker to release its connection
    pub fn stop_and_wait(&self) -> StopAck {
        let ack = self.stop();
        let retired: Vec<Worker> = self.control.lock().retired.drain(..).collect();
        for worker in retired {
            worker.join();
        }
        ack
    }

    /// Receive every frame read from now on
    pub fn subscribe_frames(&self) -> broadcast::Receiver<Arc<FrameBuffer>> {
        self.shared.frames.subscribe()
    }

    /// Watch status changes
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.shared.status.subscribe()
    }

    /// Current status
    pub fn status(&self) -> SessionStatus {
        self.shared.status.borrow().clone()
    }

    /// Whether frames are flowing
    pub fn is_active(&self) -> bool {
        self.shared.status.borrow().is_active()
    }

    /// Source being read, when running
    pub fn source(&self) -> Option<String> {
        self.shared.status.borrow().source().map(str::to_string)
    }

    /// Session metrics
    pub fn metrics(&self) -> &Arc<StreamMetrics> {
        &self.shared.metrics
    }

    /// Spawn a worker and wait until it has opened `source`
    fn spawn_worker(&self, control: &mut Control, source: &str) -> Result<Worker> {
        let generation = control.bump_generation();
        let signal = Arc::new(AtomicU8::new(WorkerSignal::Run as u8));
        let (ready_tx, ready_rx) = mpsc::channel();

        let ctx = WorkerContext {
            backend: Arc::clone(&self.backend),
            shared: Arc::clone(&self.shared),
            source: source.to_string(),
            generation,
            signal: Arc::clone(&signal),
        };

        let thread = std::thread::Builder::new()
            .name(format!("framecast-capture-{}", self.id))
            .spawn(move || ctx.run(ready_tx))
            .map_err(|e| FramecastError::stream_open(source, format!("Failed to spawn capture thread: {}", e)))?;

        let opened = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(FramecastError::stream_open(source, "capture worker exited while opening")));

        let worker = Worker {
            generation,
            source: source.to_string(),
            signal,
            thread,
        };

        match opened {
            Ok(()) => Ok(worker),
            Err(err) => {
                worker.join();
                Err(err)
            }
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        let control = self.control.get_mut();
        if let Some(worker) = control.worker.as_ref() {
            worker.signal(WorkerSignal::Stop);
        }
        for worker in &control.retired {
            worker.signal(WorkerSignal::Stop);
        }
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("id", &self.id)
            .field("backend", &self.backend.name())
            .field("status", &*self.shared.status.borrow())
            .finish()
    }
}

/// Everything a worker thread owns
struct WorkerContext {
    backend: Arc<dyn CaptureBackend>,
    shared: Arc<Shared>,
    source: String,
    generation: u64,
    signal: Arc<AtomicU8>,
}

impl WorkerContext {
    fn current_signal(&self) -> WorkerSignal {
        WorkerSignal::from_u8(self.signal.load(Ordering::SeqCst))
    }

    /// Open the source, report back, then read until told otherwise
    fn run(self, ready: mpsc::Sender<Result<()>>) {
        let mut handle = match self.backend.open(&self.source) {
            Ok(handle) => handle,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };

        self.shared.status.send_replace(SessionStatus {
            generation: self.generation,
            state: SessionState::Running {
                source: self.source.clone(),
            },
        });
        let _ = ready.send(Ok(()));
        debug!("Capture worker {} reading {}", self.generation, self.source);

        let mut failure = None;
        while self.current_signal() == WorkerSignal::Run {
            match handle.read_frame() {
                Ok(mut frame) => {
                    frame.sequence = self.shared.sequence.fetch_add(1, Ordering::Relaxed);
                    self.shared.metrics.record_frame_captured();
                    if frame.sequence % 300 == 0 {
                        trace!("Captured {} frames", frame.sequence + 1);
                    }
                    // No subscribers is fine
                    let _ = self.shared.frames.send(Arc::new(frame));
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        drop(handle);
        debug!("Capture worker {} released {}", self.generation, self.source);

        let generation = self.generation;
        match self.current_signal() {
            WorkerSignal::Replace => {}
            WorkerSignal::Stop => {
                self.shared.status.send_if_modified(|status| {
                    if status.generation == generation {
                        status.state = SessionState::Idle;
                        true
                    } else {
                        false
                    }
                });
                info!("Capture of {} stopped", self.source);
            }
            WorkerSignal::Run => {
                let reason = failure
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| FramecastError::EndOfStream.to_string());
                warn!("Upstream {} ended: {}", self.source, reason);
                self.shared.status.send_if_modified(|status| {
                    if status.generation == generation {
                        status.state = SessionState::Ended { reason };
                        true
                    } else {
                        false
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_roundtrip() {
        for signal in [WorkerSignal::Run, WorkerSignal::Stop, WorkerSignal::Replace] {
            assert_eq!(WorkerSignal::from_u8(signal as u8), signal);
        }
    }

    #[test]
    fn test_status_helpers() {
        let running = SessionStatus {
            generation: 3,
            state: SessionState::Running {
                source: "rtsp://cam/1".into(),
            },
        };
        assert!(running.is_active());
        assert_eq!(running.source(), Some("rtsp://cam/1"));
        assert_eq!(running.state.name(), "running");

        let stopping = SessionStatus {
            generation: 3,
            state: SessionState::Stopping,
        };
        assert!(!stopping.is_active());
        assert_eq!(stopping.source(), None);
    }

    #[test]
    fn test_state_serializes_tagged() {
        let json = serde_json::to_value(SessionState::Ended {
            reason: "End of stream".into(),
        })
        .unwrap();
        assert_eq!(json["state"], "ended");
        assert_eq!(json["reason"], "End of stream");
    }
}
