use crate::config::PlayerConfig;
use crate::events::{EventBus, EventKind, PlayerEvent, Subscription};
use crate::media::{MediaEvent, MediaHandle, MediaHandleResolver};
use crate::models::{LessonId, Orientation, PlaybackId};
use crate::progress::ProgressGateway;
use crate::state::VideoStateStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Where the controller is in its lifecycle, for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    /// No playback id to work with
    Empty,
    /// Element resolution in progress or metadata not yet loaded
    Loading,
    /// Metadata loaded, listeners attached
    Ready,
    /// Resolution gave up or the element reported a failure
    Error,
}

/// What a controller needs to drive a lesson's video
#[derive(Clone)]
pub struct ControllerContext {
    pub store: VideoStateStore,
    pub bus: EventBus,
    pub gateway: Arc<dyn ProgressGateway>,
    pub resolver: Arc<dyn MediaHandleResolver>,
    pub config: PlayerConfig,
}

struct ControllerInner {
    lesson_id: LessonId,
    playback_id: Option<PlaybackId>,
    start_at_percent: f64,
    ctx: ControllerContext,
    cancelled: AtomicBool,
    detached: AtomicBool,
    media: Mutex<Option<Arc<dyn MediaHandle>>>,
    initial_seek_done: AtomicBool,
    last_report: Mutex<Option<Instant>>,
    phase: Mutex<ControllerPhase>,
    seek_subscription: Mutex<Option<Subscription>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Drives one lesson's video: locates the media element inside the hosting
/// player component, wires its events into the state store, resolves the
/// resume position once, and reports progress through the gateway
///
/// The controller is a failure boundary: nothing the player component does
/// propagates to the host view. Every failure lands in the store's `error`
/// field with loading cleared.
pub struct VideoController {
    inner: Arc<ControllerInner>,
}

impl VideoController {
    /// Attach a controller for `(lesson_id, playback_id)`
    ///
    /// `start_at_percent` (0–100) takes priority over the cached resume
    /// position when > 0. With no playback id the controller stays in
    /// [`ControllerPhase::Empty`] and does nothing until rebuilt.
    pub fn attach(
        lesson_id: LessonId,
        playback_id: Option<PlaybackId>,
        start_at_percent: f64,
        ctx: ControllerContext,
    ) -> Self {
        let inner = Arc::new(ControllerInner {
            lesson_id,
            playback_id,
            start_at_percent,
            ctx,
            cancelled: AtomicBool::new(false),
            detached: AtomicBool::new(false),
            media: Mutex::new(None),
            initial_seek_done: AtomicBool::new(false),
            last_report: Mutex::new(None),
            phase: Mutex::new(ControllerPhase::Empty),
            seek_subscription: Mutex::new(None),
            task: Mutex::new(None),
        });

        let controller = VideoController {
            inner: inner.clone(),
        };

        let Some(playback_id) = inner.playback_id.clone() else {
            debug!("No playback id for lesson {}, staying empty", inner.lesson_id);
            return controller;
        };

        *inner.phase.lock().unwrap() = ControllerPhase::Loading;
        inner.ctx.store.set_active_lesson(inner.lesson_id.clone());
        inner.ctx.store.set_active_playback(playback_id);
        inner.ctx.store.set_loading(true);

        // External seeks reach the element even before the run task has
        // retained a handle, by re-resolving on demand.
        let weak = Arc::downgrade(&inner);
        let subscription = inner.ctx.bus.subscribe(EventKind::SeekTo, move |event| {
            let Some(inner) = weak.upgrade() else { return };
            if let PlayerEvent::SeekTo {
                lesson_id,
                time_seconds,
            } = event
            {
                if *lesson_id == inner.lesson_id {
                    seek_element(&inner, *time_seconds);
                }
            }
        });
        *inner.seek_subscription.lock().unwrap() = Some(subscription);

        let task_inner = inner.clone();
        let task = tokio::spawn(async move {
            run(task_inner).await;
        });
        *inner.task.lock().unwrap() = Some(task);

        controller
    }

    pub fn lesson_id(&self) -> &str {
        &self.inner.lesson_id
    }

    pub fn phase(&self) -> ControllerPhase {
        *self.inner.phase.lock().unwrap()
    }

    /// HLS URL for the active video, if a playback id was supplied
    pub fn stream_url(&self) -> Option<String> {
        self.inner
            .playback_id
            .as_deref()
            .map(|id| self.inner.ctx.config.stream_url(id))
    }

    /// Poster image URL for the active video, if a playback id was supplied
    pub fn poster_url(&self) -> Option<String> {
        self.inner
            .playback_id
            .as_deref()
            .map(|id| self.inner.ctx.config.poster_url(id))
    }

    /// Tear down: stop the resolution loop, drop listeners and the bus
    /// subscription, reset the one-shot seek and throttle bookkeeping, and
    /// restore the store to defaults. Safe to call repeatedly.
    pub fn detach(&self) {
        if self.inner.detached.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = &self.inner;
        inner.cancelled.store(true, Ordering::SeqCst);

        if let Some(task) = inner.task.lock().unwrap().take() {
            task.abort();
        }
        if let Some(mut subscription) = inner.seek_subscription.lock().unwrap().take() {
            subscription.unsubscribe();
        }

        *inner.media.lock().unwrap() = None;
        inner.initial_seek_done.store(false, Ordering::SeqCst);
        *inner.last_report.lock().unwrap() = None;
        *inner.phase.lock().unwrap() = ControllerPhase::Empty;

        inner.ctx.store.clear_media();
        inner.ctx.store.reset_video_state();
        info!("Detached video controller for lesson {}", inner.lesson_id);
    }
}

impl Drop for VideoController {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Set the element's position directly, re-resolving if no handle is retained
fn seek_element(inner: &Arc<ControllerInner>, time_seconds: f64) {
    let retained = inner.media.lock().unwrap().clone();
    let media = retained.or_else(|| inner.ctx.resolver.resolve());
    match media {
        Some(media) => {
            debug!(
                "External seek to {}s for lesson {}",
                time_seconds, inner.lesson_id
            );
            media.set_current_time(time_seconds);
        }
        None => debug!(
            "External seek dropped, no media element for lesson {}",
            inner.lesson_id
        ),
    }
}

async fn run(inner: Arc<ControllerInner>) {
    let Some(media) = resolve_media(&inner).await else {
        return;
    };
    if inner.cancelled.load(Ordering::SeqCst) {
        return;
    }

    *inner.media.lock().unwrap() = Some(media.clone());
    inner.ctx.store.register_media(media.clone());

    let Some(mut events) = media.take_events() else {
        inner
            .ctx
            .store
            .set_error("media element events already claimed");
        *inner.phase.lock().unwrap() = ControllerPhase::Error;
        return;
    };

    while let Some(event) = events.recv().await {
        if inner.cancelled.load(Ordering::SeqCst) {
            break;
        }
        handle_media_event(&inner, &media, event);
    }
}

/// Frame-paced retry until the player component's markup hydrates
///
/// Checks the cancellation flag before every attempt. With a retry budget
/// configured, exhaustion surfaces as an error instead of perpetual loading.
async fn resolve_media(inner: &Arc<ControllerInner>) -> Option<Arc<dyn MediaHandle>> {
    let mut attempts: u32 = 0;
    loop {
        if inner.cancelled.load(Ordering::SeqCst) {
            return None;
        }
        if let Some(media) = inner.ctx.resolver.resolve() {
            debug!(
                "Resolved media element for lesson {} after {} attempts",
                inner.lesson_id, attempts
            );
            return Some(media);
        }

        attempts += 1;
        if let Some(budget) = inner.ctx.config.resolve_retry_budget {
            if attempts >= budget {
                warn!(
                    "Gave up locating media element for lesson {} after {} attempts",
                    inner.lesson_id, attempts
                );
                inner.ctx.store.set_error("player element not found");
                *inner.phase.lock().unwrap() = ControllerPhase::Error;
                return None;
            }
        }

        tokio::time::sleep(inner.ctx.config.resolve_frame_interval).await;
    }
}

fn handle_media_event(inner: &Arc<ControllerInner>, media: &Arc<dyn MediaHandle>, event: MediaEvent) {
    match event {
        MediaEvent::LoadedMetadata { duration_seconds } => {
            inner.ctx.store.set_duration(duration_seconds);
            if let Some((width, height)) = media.video_size() {
                if height > 0 {
                    inner.ctx.store.set_video_shape(
                        width as f64 / height as f64,
                        Orientation::from_size(width, height),
                    );
                }
            }

            // Resolve the resume position at most once per attach; a source
            // change re-firing loadedmetadata must not seek again.
            if !inner.initial_seek_done.swap(true, Ordering::SeqCst) {
                if let Some(position) = initial_seek_position(inner, duration_seconds) {
                    info!(
                        "Resuming lesson {} at {:.1}s",
                        inner.lesson_id, position
                    );
                    media.set_current_time(position);
                }
            }

            inner.ctx.store.set_loading(false);
            *inner.phase.lock().unwrap() = ControllerPhase::Ready;
        }
        MediaEvent::TimeUpdate { position_seconds } => {
            // Ticks before the initial seek resolves would overwrite the
            // just-applied resume point with a stale zero.
            if !inner.initial_seek_done.load(Ordering::SeqCst) {
                return;
            }
            inner.ctx.store.set_current_time(position_seconds);
            maybe_report_progress(inner, position_seconds);
        }
        MediaEvent::Play => {
            inner.ctx.store.set_playing(true);
            inner.ctx.bus.dispatch(PlayerEvent::Play {
                lesson_id: inner.lesson_id.clone(),
            });
        }
        MediaEvent::Pause => {
            inner.ctx.store.set_playing(false);
            inner.ctx.bus.dispatch(PlayerEvent::Pause {
                lesson_id: inner.lesson_id.clone(),
            });
        }
        MediaEvent::Error { message } => {
            warn!("Playback error for lesson {}: {}", inner.lesson_id, message);
            inner.ctx.store.set_error(message);
            *inner.phase.lock().unwrap() = ControllerPhase::Error;
        }
    }
}

/// Resume-position precedence: explicit start percentage, then cached
/// progress beyond the resume threshold, then stay at zero
fn initial_seek_position(inner: &ControllerInner, duration_seconds: f64) -> Option<f64> {
    if inner.start_at_percent > 0.0 {
        return Some(inner.start_at_percent / 100.0 * duration_seconds);
    }
    let cached = inner.ctx.gateway.read_cached(&inner.lesson_id)?;
    if cached.last_position_seconds > inner.ctx.config.resume_threshold_seconds {
        Some(cached.last_position_seconds)
    } else {
        None
    }
}

/// Throttle, not debounce: the first qualifying tick after the window fires
/// immediately, ticks inside the window are dropped
fn maybe_report_progress(inner: &Arc<ControllerInner>, position_seconds: f64) {
    let now = Instant::now();
    {
        let mut last_report = inner.last_report.lock().unwrap();
        match *last_report {
            Some(last) if now.duration_since(last) < inner.ctx.config.report_interval => return,
            _ => *last_report = Some(now),
        }
    }

    let duration = inner.ctx.store.duration_seconds();
    inner.ctx.gateway.report(
        &inner.lesson_id,
        position_seconds.floor() as u64,
        duration.floor() as u64,
    );
}
