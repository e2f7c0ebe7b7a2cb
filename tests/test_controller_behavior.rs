#![cfg(feature = "test-utils")]

mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::support::{tracing_init, wait_until};
use playhead::chapters::ChapterApiClient;
use playhead::config::PlayerConfig;
use playhead::controller::{ControllerContext, ControllerPhase, VideoController};
use playhead::events::{EventBus, EventKind, PlayerEvent};
use playhead::media::MediaEvent;
use playhead::models::{Chapter, ProgressRecord, ProgressStatus};
use playhead::session::{LessonDescriptor, LessonSession, SessionDeps};
use playhead::state::VideoStateStore;
use playhead::test_support::{FakeMediaHandle, RecordingGateway, StubResolver};

/// Controller plus every collaborator the tests poke at
struct ControllerFixture {
    bus: EventBus,
    store: VideoStateStore,
    media: Arc<FakeMediaHandle>,
    controller: VideoController,
}

impl ControllerFixture {
    fn attach(lesson_id: &str, start_at_percent: f64, gateway: Arc<RecordingGateway>) -> Self {
        tracing_init();

        let bus = EventBus::new();
        let store = VideoStateStore::new();
        let media = FakeMediaHandle::with_size(1920, 1080);
        let resolver = StubResolver::immediate(media.clone());

        let controller = VideoController::attach(
            lesson_id.to_string(),
            Some(format!("{lesson_id}-playback")),
            start_at_percent,
            ControllerContext {
                store: store.clone(),
                bus: bus.clone(),
                gateway,
                resolver,
                config: PlayerConfig::default(),
            },
        );

        ControllerFixture {
            bus,
            store,
            media,
            controller,
        }
    }

    async fn wait_ready(&self) {
        let ready = wait_until(
            || self.controller.phase() == ControllerPhase::Ready,
            Duration::from_secs(2),
        )
        .await;
        assert!(ready, "Controller should reach ready after metadata");
    }
}

fn cached_record(lesson_id: &str, position: f64) -> ProgressRecord {
    ProgressRecord {
        lesson_id: lesson_id.to_string(),
        last_position_seconds: position,
        duration_seconds: 300.0,
        status: ProgressStatus::InProgress,
        completed_at: None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_progress_reports_are_throttled() {
    let gateway = RecordingGateway::new();
    let fixture = ControllerFixture::attach("l1", 0.0, gateway.clone());

    fixture.media.emit(MediaEvent::LoadedMetadata {
        duration_seconds: 600.0,
    });
    fixture.wait_ready().await;

    // Sub-second ticks over 12 simulated seconds
    for i in 0..48u32 {
        fixture.media.emit(MediaEvent::TimeUpdate {
            position_seconds: f64::from(i) * 0.25,
        });
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    let reports = gateway.reports();
    assert!(
        (2..=3).contains(&reports.len()),
        "Expected 2-3 throttled reports, got {:?}",
        reports
    );
    // First qualifying tick fires immediately, the rest at >= 5s spacing
    assert_eq!(reports[0], ("l1".to_string(), 0, 600));
    for pair in reports.windows(2) {
        assert!(
            pair[1].1 >= pair[0].1 + 5,
            "Reports closer than the 5s window: {:?}",
            reports
        );
    }
}

#[tokio::test]
async fn test_initial_seek_from_start_percentage_happens_once() {
    let fixture = ControllerFixture::attach("l1", 50.0, RecordingGateway::new());

    fixture.media.emit(MediaEvent::LoadedMetadata {
        duration_seconds: 200.0,
    });
    fixture.wait_ready().await;

    let seeked = wait_until(|| !fixture.media.seeks().is_empty(), Duration::from_secs(2)).await;
    assert!(seeked, "Initial seek should have been applied");
    assert_eq!(fixture.media.seeks(), vec![100.0]);

    // A source change re-fires loadedmetadata; the resume point must not
    // be applied a second time
    fixture.media.emit(MediaEvent::LoadedMetadata {
        duration_seconds: 200.0,
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fixture.media.seeks(), vec![100.0]);
}

#[tokio::test]
async fn test_resume_falls_back_to_cached_position() {
    let gateway = RecordingGateway::with_cached(cached_record("l1", 42.0));
    let fixture = ControllerFixture::attach("l1", 0.0, gateway);

    fixture.media.emit(MediaEvent::LoadedMetadata {
        duration_seconds: 300.0,
    });
    fixture.wait_ready().await;

    let seeked = wait_until(|| !fixture.media.seeks().is_empty(), Duration::from_secs(2)).await;
    assert!(seeked, "Cached position should trigger a resume seek");
    assert_eq!(fixture.media.seeks(), vec![42.0]);
}

#[tokio::test]
async fn test_short_cached_position_does_not_seek() {
    let gateway = RecordingGateway::with_cached(cached_record("l1", 3.0));
    let fixture = ControllerFixture::attach("l1", 0.0, gateway);

    fixture.media.emit(MediaEvent::LoadedMetadata {
        duration_seconds: 300.0,
    });
    fixture.wait_ready().await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(
        fixture.media.seeks().is_empty(),
        "Positions at or below the resume threshold must stay at zero"
    );
}

#[tokio::test]
async fn test_time_updates_before_metadata_are_ignored() {
    let gateway = RecordingGateway::new();
    let fixture = ControllerFixture::attach("l1", 0.0, gateway.clone());

    fixture.media.emit(MediaEvent::TimeUpdate {
        position_seconds: 99.0,
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fixture.store.current_time_seconds(), 0.0);
    assert!(gateway.reports().is_empty());

    fixture.media.emit(MediaEvent::LoadedMetadata {
        duration_seconds: 300.0,
    });
    fixture.wait_ready().await;
    fixture.media.emit(MediaEvent::TimeUpdate {
        position_seconds: 7.0,
    });

    let tracked = wait_until(
        || fixture.store.current_time_seconds() == 7.0,
        Duration::from_secs(2),
    )
    .await;
    assert!(tracked, "Ticks after the initial seek should reach the store");
}

#[tokio::test]
async fn test_detach_is_idempotent_and_leaves_no_subscriptions() {
    tracing_init();

    let bus = EventBus::new();
    let store = VideoStateStore::new();
    let controller = VideoController::attach(
        "l1".to_string(),
        Some("p1".to_string()),
        0.0,
        ControllerContext {
            store: store.clone(),
            bus: bus.clone(),
            gateway: RecordingGateway::new(),
            // Never resolves: teardown happens mid-resolution
            resolver: StubResolver::never(),
            config: PlayerConfig::default(),
        },
    );
    assert_eq!(bus.subscription_count(), 1);
    assert!(store.is_loading());

    controller.detach();
    controller.detach();

    assert_eq!(bus.subscription_count(), 0);
    let state = store.snapshot();
    assert!(!state.is_loading);
    assert!(state.error.is_none());
    assert_eq!(state.current_time_seconds, 0.0);
}

#[tokio::test]
async fn test_bus_seek_reaches_matching_controller_only() {
    let fixture_one = ControllerFixture::attach("l1", 0.0, RecordingGateway::new());

    // Second controller for a different lesson on the same bus
    let media_two = FakeMediaHandle::new();
    let _controller_two = VideoController::attach(
        "l2".to_string(),
        Some("l2-playback".to_string()),
        0.0,
        ControllerContext {
            store: VideoStateStore::new(),
            bus: fixture_one.bus.clone(),
            gateway: RecordingGateway::new(),
            resolver: StubResolver::immediate(media_two.clone()),
            config: PlayerConfig::default(),
        },
    );

    fixture_one.bus.dispatch(PlayerEvent::SeekTo {
        lesson_id: "l1".to_string(),
        time_seconds: 77.0,
    });

    assert_eq!(fixture_one.media.seeks(), vec![77.0]);
    assert!(
        media_two.seeks().is_empty(),
        "Controller for another lesson must ignore the seek"
    );
}

#[tokio::test]
async fn test_bus_seek_resolves_element_on_demand() {
    tracing_init();

    let bus = EventBus::new();
    let store = VideoStateStore::new();
    let media = FakeMediaHandle::new();
    // Resolution succeeds late; the bus path must not depend on the run
    // task having retained a handle yet
    let _controller = VideoController::attach(
        "l1".to_string(),
        Some("p1".to_string()),
        0.0,
        ControllerContext {
            store,
            bus: bus.clone(),
            gateway: RecordingGateway::new(),
            resolver: StubResolver::immediate(media.clone()),
            config: PlayerConfig::default(),
        },
    );

    bus.dispatch(PlayerEvent::SeekTo {
        lesson_id: "l1".to_string(),
        time_seconds: 12.0,
    });

    assert_eq!(media.seeks(), vec![12.0]);
}

#[tokio::test]
async fn test_playback_error_preserves_position_and_chapters() {
    let fixture = ControllerFixture::attach("l1", 0.0, RecordingGateway::new());

    fixture.media.emit(MediaEvent::LoadedMetadata {
        duration_seconds: 300.0,
    });
    fixture.wait_ready().await;
    fixture.media.emit(MediaEvent::TimeUpdate {
        position_seconds: 30.0,
    });
    let tracked = wait_until(
        || fixture.store.current_time_seconds() == 30.0,
        Duration::from_secs(2),
    )
    .await;
    assert!(tracked);

    fixture.store.set_chapters(vec![Chapter {
        id: "c1".to_string(),
        title: "Intro".to_string(),
        timestamp_seconds: 0,
        description: None,
    }]);

    fixture.media.emit(MediaEvent::Error {
        message: "network stall".to_string(),
    });
    let errored = wait_until(|| fixture.store.error().is_some(), Duration::from_secs(2)).await;
    assert!(errored);

    let state = fixture.store.snapshot();
    assert_eq!(state.error.as_deref(), Some("network stall"));
    assert!(!state.is_loading);
    assert_eq!(state.current_time_seconds, 30.0);
    assert_eq!(state.chapters.len(), 1);
    assert_eq!(fixture.controller.phase(), ControllerPhase::Error);
}

#[tokio::test(start_paused = true)]
async fn test_resolution_budget_exhaustion_surfaces_error() {
    tracing_init();

    let store = VideoStateStore::new();
    let config = PlayerConfig {
        resolve_retry_budget: Some(5),
        resolve_frame_interval: Duration::from_millis(1),
        ..PlayerConfig::default()
    };
    let controller = VideoController::attach(
        "l1".to_string(),
        Some("p1".to_string()),
        0.0,
        ControllerContext {
            store: store.clone(),
            bus: EventBus::new(),
            gateway: RecordingGateway::new(),
            resolver: StubResolver::never(),
            config,
        },
    );

    let errored = wait_until(
        || controller.phase() == ControllerPhase::Error,
        Duration::from_secs(2),
    )
    .await;
    assert!(errored, "Budget exhaustion should surface as an error");
    assert_eq!(store.error().as_deref(), Some("player element not found"));
    assert!(!store.is_loading());
}

#[tokio::test]
async fn test_play_pause_toggle_state_and_mirror_on_bus() {
    let fixture = ControllerFixture::attach("l1", 0.0, RecordingGateway::new());
    let observed = Arc::new(Mutex::new(Vec::new()));

    let observed_play = observed.clone();
    let _sub_play = fixture.bus.subscribe(EventKind::Play, move |event| {
        observed_play.lock().unwrap().push(event.clone());
    });
    let observed_pause = observed.clone();
    let _sub_pause = fixture.bus.subscribe(EventKind::Pause, move |event| {
        observed_pause.lock().unwrap().push(event.clone());
    });

    fixture.media.emit(MediaEvent::LoadedMetadata {
        duration_seconds: 300.0,
    });
    fixture.wait_ready().await;

    fixture.media.emit(MediaEvent::Play);
    let playing = wait_until(|| fixture.store.is_playing(), Duration::from_secs(2)).await;
    assert!(playing);

    fixture.media.emit(MediaEvent::Pause);
    let paused = wait_until(|| !fixture.store.is_playing(), Duration::from_secs(2)).await;
    assert!(paused);

    let events = observed.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            PlayerEvent::Play {
                lesson_id: "l1".to_string()
            },
            PlayerEvent::Pause {
                lesson_id: "l1".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_controller_without_playback_id_stays_empty() {
    tracing_init();

    let bus = EventBus::new();
    let store = VideoStateStore::new();
    let controller = VideoController::attach(
        "l1".to_string(),
        None,
        0.0,
        ControllerContext {
            store: store.clone(),
            bus: bus.clone(),
            gateway: RecordingGateway::new(),
            resolver: StubResolver::never(),
            config: PlayerConfig::default(),
        },
    );

    assert_eq!(controller.phase(), ControllerPhase::Empty);
    assert_eq!(bus.subscription_count(), 0);
    assert!(!store.is_loading());
    assert!(controller.stream_url().is_none());
}

#[tokio::test]
async fn test_session_wires_and_tears_down() {
    tracing_init();

    let bus = EventBus::new();
    let media = FakeMediaHandle::new();
    let session = LessonSession::start(
        LessonDescriptor {
            lesson_id: "l1".to_string(),
            playback_id: Some("p1".to_string()),
            start_at_percent: 0.0,
        },
        SessionDeps {
            bus: bus.clone(),
            gateway: RecordingGateway::new(),
            resolver: StubResolver::immediate(media.clone()),
            chapter_api: ChapterApiClient::new("http://127.0.0.1:9/chapters".to_string()),
            config: PlayerConfig::default(),
        },
    );

    media.emit(MediaEvent::LoadedMetadata {
        duration_seconds: 300.0,
    });
    let ready = wait_until(
        || session.controller().phase() == ControllerPhase::Ready,
        Duration::from_secs(2),
    )
    .await;
    assert!(ready);
    assert_eq!(
        session.controller().stream_url().as_deref(),
        Some("https://stream.mux.com/p1.m3u8")
    );
    assert_eq!(
        session.controller().poster_url().as_deref(),
        Some("https://image.mux.com/p1/thumbnail.jpg")
    );

    session.end();
    assert_eq!(bus.subscription_count(), 0);
    let state = session.store().snapshot();
    assert!(!state.is_loading);
    assert_eq!(state.duration_seconds, 0.0);
}
