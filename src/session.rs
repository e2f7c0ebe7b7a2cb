use crate::chapters::{ChapterApiClient, ChapterNavigator};
use crate::config::PlayerConfig;
use crate::controller::{ControllerContext, VideoController};
use crate::events::EventBus;
use crate::media::MediaHandleResolver;
use crate::models::{LessonId, PlaybackId};
use crate::progress::ProgressGateway;
use crate::state::VideoStateStore;
use std::sync::Arc;

/// What lesson a session is viewing and where to start
#[derive(Debug, Clone)]
pub struct LessonDescriptor {
    pub lesson_id: LessonId,
    pub playback_id: Option<PlaybackId>,
    /// Explicit starting point as a 0–100 percentage; 0 defers to cached
    /// progress
    pub start_at_percent: f64,
}

/// Collaborators a session wires together, injected by the host
#[derive(Clone)]
pub struct SessionDeps {
    pub bus: EventBus,
    pub gateway: Arc<dyn ProgressGateway>,
    pub resolver: Arc<dyn MediaHandleResolver>,
    pub chapter_api: ChapterApiClient,
    pub config: PlayerConfig,
}

/// One mounted lesson view: owns the state store and wires the controller and
/// chapter navigation to it
///
/// The store is exclusive to this session; ending the session tears both
/// components down and resets it.
pub struct LessonSession {
    store: VideoStateStore,
    controller: VideoController,
    navigator: Option<ChapterNavigator>,
}

impl LessonSession {
    pub fn start(descriptor: LessonDescriptor, deps: SessionDeps) -> Self {
        let store = VideoStateStore::new();

        let controller = VideoController::attach(
            descriptor.lesson_id.clone(),
            descriptor.playback_id.clone(),
            descriptor.start_at_percent,
            ControllerContext {
                store: store.clone(),
                bus: deps.bus.clone(),
                gateway: deps.gateway,
                resolver: deps.resolver,
                config: deps.config,
            },
        );

        // Chapters need a playback id to query the transcript service
        let navigator = descriptor.playback_id.map(|playback_id| {
            ChapterNavigator::new(
                descriptor.lesson_id,
                playback_id,
                store.clone(),
                deps.bus,
                deps.chapter_api,
            )
        });

        LessonSession {
            store,
            controller,
            navigator,
        }
    }

    pub fn store(&self) -> &VideoStateStore {
        &self.store
    }

    pub fn controller(&self) -> &VideoController {
        &self.controller
    }

    pub fn chapters(&self) -> Option<&ChapterNavigator> {
        self.navigator.as_ref()
    }

    /// Tear down both components; the store goes back to defaults
    pub fn end(&self) {
        if let Some(navigator) = &self.navigator {
            navigator.detach();
        }
        self.controller.detach();
    }
}

impl Drop for LessonSession {
    fn drop(&mut self) {
        self.end();
    }
}
