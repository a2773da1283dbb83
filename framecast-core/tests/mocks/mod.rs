//! Mock infrastructure for testing
//!
//! A capture backend that records every open and release, scripted frame
//! sources, and encoders that never touch FFmpeg.

#![allow(dead_code)]

use framecast_core::capture::{CaptureBackend, FrameSource};
use framecast_core::encode::FrameEncoder;
use framecast_core::error::{FramecastError, Result};
use framecast_core::types::{EncodedChunk, FrameBuffer};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Width of frames produced by mock sources
pub const FRAME_WIDTH: u32 = 64;

/// Height of frames produced by mock sources
pub const FRAME_HEIGHT: u32 = 48;

/// Background colour of mock frames
pub const BACKGROUND: [u8; 3] = [0, 0, 0];

/// Something the mock backend observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Opened(String),
    OpenFailed(String),
    Released(String),
}

#[derive(Default)]
struct BackendState {
    events: Mutex<Vec<Event>>,
    open_handles: AtomicUsize,
    max_open_handles: AtomicUsize,
}

impl BackendState {
    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }
}

/// Capture backend with scripted reachability and release tracking
#[derive(Clone)]
pub struct MockBackend {
    state: Arc<BackendState>,
    unreachable: Arc<Mutex<HashSet<String>>>,
    single_use: Arc<Mutex<HashSet<String>>>,
    frame_limits: Arc<Mutex<HashMap<String, u64>>>,
    frame_interval: Duration,
}

impl MockBackend {
    /// Backend where every source is reachable and endless
    pub fn new() -> Self {
        Self {
            state: Arc::new(BackendState::default()),
            unreachable: Arc::new(Mutex::new(HashSet::new())),
            single_use: Arc::new(Mutex::new(HashSet::new())),
            frame_limits: Arc::new(Mutex::new(HashMap::new())),
            frame_interval: Duration::from_millis(2),
        }
    }

    /// Make a source fail to open
    pub fn unreachable(self, source: &str) -> Self {
        self.unreachable.lock().insert(source.to_string());
        self
    }

    /// Let a source open once; later opens fail
    pub fn single_use(self, source: &str) -> Self {
        self.single_use.lock().insert(source.to_string());
        self
    }

    /// End a source after `frames` frames
    pub fn with_frame_limit(self, source: &str, frames: u64) -> Self {
        self.frame_limits.lock().insert(source.to_string(), frames);
        self
    }

    /// Set the delay between frames
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Everything observed so far
    pub fn events(&self) -> Vec<Event> {
        self.state.events.lock().clone()
    }

    /// Connections currently open
    pub fn open_handles(&self) -> usize {
        self.state.open_handles.load(Ordering::SeqCst)
    }

    /// Most connections ever open at once
    pub fn max_open_handles(&self) -> usize {
        self.state.max_open_handles.load(Ordering::SeqCst)
    }

    /// Successful opens of `source`
    pub fn opens_of(&self, source: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| **e == Event::Opened(source.to_string()))
            .count()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for MockBackend {
    fn open(&self, source: &str) -> Result<Box<dyn FrameSource>> {
        let refused = self.unreachable.lock().contains(source);
        if refused {
            self.state.record(Event::OpenFailed(source.to_string()));
            return Err(FramecastError::stream_open(source, "connection refused"));
        }

        {
            let mut single_use = self.single_use.lock();
            if single_use.remove(source) {
                self.unreachable.lock().insert(source.to_string());
            }
        }

        let open = self.state.open_handles.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_open_handles.fetch_max(open, Ordering::SeqCst);
        self.state.record(Event::Opened(source.to_string()));

        Ok(Box::new(MockSource {
            source: source.to_string(),
            state: Arc::clone(&self.state),
            remaining: self.frame_limits.lock().get(source).copied(),
            interval: self.frame_interval,
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// A scripted source producing solid frames
struct MockSource {
    source: String,
    state: Arc<BackendState>,
    remaining: Option<u64>,
    interval: Duration,
}

impl FrameSource for MockSource {
    fn read_frame(&mut self) -> Result<FrameBuffer> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Err(FramecastError::EndOfStream);
            }
            *remaining -= 1;
        }
        std::thread::sleep(self.interval);
        Ok(FrameBuffer::filled(FRAME_WIDTH, FRAME_HEIGHT, BACKGROUND))
    }
}

impl Drop for MockSource {
    fn drop(&mut self) {
        self.state.open_handles.fetch_sub(1, Ordering::SeqCst);
        self.state.record(Event::Released(self.source.clone()));
    }
}

/// Encoder that keeps every frame it was given
///
/// Output is `FF D8`, the big-endian sequence, `FF D9`.
#[derive(Default)]
pub struct RecordingEncoder {
    frames: Mutex<Vec<FrameBuffer>>,
}

impl RecordingEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames encoded so far
    pub fn frames(&self) -> Vec<FrameBuffer> {
        self.frames.lock().clone()
    }

    /// Fake JPEG bytes for a sequence
    pub fn jpeg_for(sequence: u64) -> Vec<u8> {
        let mut jpeg = vec![0xFF, 0xD8];
        jpeg.extend_from_slice(&sequence.to_be_bytes());
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }
}

impl FrameEncoder for RecordingEncoder {
    fn encode(&self, frame: &FrameBuffer) -> Result<EncodedChunk> {
        if !frame.is_well_formed() {
            return Err(FramecastError::encode("bad shape"));
        }
        self.frames.lock().push(frame.clone());
        Ok(EncodedChunk::new(frame.sequence, Self::jpeg_for(frame.sequence)))
    }
}

/// Encoder that always fails
#[derive(Default)]
pub struct FailingEncoder {
    calls: AtomicUsize,
}

impl FailingEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FrameEncoder for FailingEncoder {
    fn encode(&self, _frame: &FrameBuffer) -> Result<EncodedChunk> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(FramecastError::encode("codec rejected frame"))
    }
}

/// Multipart header that precedes every JPEG part
pub const PART_HEADER: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";

/// Pull the sequence out of a multipart part produced via `RecordingEncoder`
pub fn part_sequence(part: &[u8]) -> Option<u64> {
    let jpeg = part.strip_prefix(PART_HEADER)?.strip_suffix(b"\r\n")?;
    let bytes: [u8; 8] = jpeg.get(2..10)?.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
