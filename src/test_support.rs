// Test support utilities for both unit and integration tests

use crate::media::{MediaEvent, MediaHandle, MediaHandleResolver};
use crate::models::ProgressRecord;
use crate::progress::ProgressGateway;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc as tokio_mpsc;

/// Scriptable media element for testing
///
/// Tests push native events through [`FakeMediaHandle::emit`] and inspect the
/// positions the controller wrote via [`FakeMediaHandle::seeks`].
pub struct FakeMediaHandle {
    current_time: Mutex<f64>,
    duration: Mutex<f64>,
    video_size: Mutex<Option<(u32, u32)>>,
    seeks: Mutex<Vec<f64>>,
    events_tx: tokio_mpsc::UnboundedSender<MediaEvent>,
    events_rx: Mutex<Option<tokio_mpsc::UnboundedReceiver<MediaEvent>>>,
}

impl Default for FakeMediaHandle {
    fn default() -> Self {
        let (events_tx, events_rx) = tokio_mpsc::unbounded_channel();
        FakeMediaHandle {
            current_time: Mutex::new(0.0),
            duration: Mutex::new(0.0),
            video_size: Mutex::new(None),
            seeks: Mutex::new(Vec::new()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }
}

impl FakeMediaHandle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_size(width: u32, height: u32) -> Arc<Self> {
        let handle = Self::default();
        *handle.video_size.lock().unwrap() = Some((width, height));
        Arc::new(handle)
    }

    /// Push a native event into the claimed stream
    pub fn emit(&self, event: MediaEvent) {
        if let MediaEvent::LoadedMetadata { duration_seconds } = &event {
            *self.duration.lock().unwrap() = *duration_seconds;
        }
        if let MediaEvent::TimeUpdate { position_seconds } = &event {
            *self.current_time.lock().unwrap() = *position_seconds;
        }
        let _ = self.events_tx.send(event);
    }

    /// Every position written through `set_current_time`, in order
    pub fn seeks(&self) -> Vec<f64> {
        self.seeks.lock().unwrap().clone()
    }
}

impl MediaHandle for FakeMediaHandle {
    fn current_time(&self) -> f64 {
        *self.current_time.lock().unwrap()
    }

    fn set_current_time(&self, seconds: f64) {
        *self.current_time.lock().unwrap() = seconds;
        self.seeks.lock().unwrap().push(seconds);
    }

    fn duration(&self) -> f64 {
        *self.duration.lock().unwrap()
    }

    fn video_size(&self) -> Option<(u32, u32)> {
        *self.video_size.lock().unwrap()
    }

    fn take_events(&self) -> Option<tokio_mpsc::UnboundedReceiver<MediaEvent>> {
        self.events_rx.lock().unwrap().take()
    }
}

/// Resolver that hands out a fixed handle, optionally only after a number of
/// failed attempts (the player markup "hydrating" late)
pub struct StubResolver {
    handle: Option<Arc<FakeMediaHandle>>,
    succeed_after: u32,
    attempts: AtomicU32,
}

impl StubResolver {
    pub fn immediate(handle: Arc<FakeMediaHandle>) -> Arc<Self> {
        Arc::new(StubResolver {
            handle: Some(handle),
            succeed_after: 0,
            attempts: AtomicU32::new(0),
        })
    }

    pub fn after_attempts(handle: Arc<FakeMediaHandle>, failures: u32) -> Arc<Self> {
        Arc::new(StubResolver {
            handle: Some(handle),
            succeed_after: failures,
            attempts: AtomicU32::new(0),
        })
    }

    /// Never finds an element, like a player component that never hydrates
    pub fn never() -> Arc<Self> {
        Arc::new(StubResolver {
            handle: None,
            succeed_after: 0,
            attempts: AtomicU32::new(0),
        })
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl MediaHandleResolver for StubResolver {
    fn resolve(&self) -> Option<Arc<dyn MediaHandle>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        let handle = self.handle.as_ref()?;
        if attempt >= self.succeed_after {
            Some(handle.clone() as Arc<dyn MediaHandle>)
        } else {
            None
        }
    }
}

/// Gateway that records reports instead of talking to the network
#[derive(Default)]
pub struct RecordingGateway {
    cached: Mutex<Option<ProgressRecord>>,
    reports: Mutex<Vec<(String, u64, u64)>>,
}

impl RecordingGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_cached(record: ProgressRecord) -> Arc<Self> {
        let gateway = Self::default();
        *gateway.cached.lock().unwrap() = Some(record);
        Arc::new(gateway)
    }

    /// `(lesson_id, position, duration)` triples in report order
    pub fn reports(&self) -> Vec<(String, u64, u64)> {
        self.reports.lock().unwrap().clone()
    }
}

impl ProgressGateway for RecordingGateway {
    fn read_cached(&self, lesson_id: &str) -> Option<ProgressRecord> {
        self.cached
            .lock()
            .unwrap()
            .clone()
            .filter(|record| record.lesson_id == lesson_id)
    }

    fn report(&self, lesson_id: &str, position_seconds: u64, duration_seconds: u64) {
        self.reports
            .lock()
            .unwrap()
            .push((lesson_id.to_string(), position_seconds, duration_seconds));
    }
}
