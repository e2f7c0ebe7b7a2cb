use std::sync::Arc;
use tokio::sync::mpsc as tokio_mpsc;

/// Signals a playable media element emits during its lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Metadata is available; duration is known from here on
    LoadedMetadata { duration_seconds: f64 },
    /// Playback position advanced
    TimeUpdate { position_seconds: f64 },
    Play,
    Pause,
    /// The element reported a playback failure
    Error { message: String },
}

/// The playable media element, however deeply the hosting player component
/// nests it
///
/// Anything exposing a read/write position, a duration, an optional natural
/// size and the [`MediaEvent`] stream satisfies the controller; the controller
/// never depends on how the element was located.
pub trait MediaHandle: Send + Sync {
    fn current_time(&self) -> f64;
    fn set_current_time(&self, seconds: f64);
    fn duration(&self) -> f64;
    /// Natural (width, height) in pixels, once metadata is loaded
    fn video_size(&self) -> Option<(u32, u32)>;
    /// Claim the element's event stream. Yields `None` after the first call;
    /// exactly one consumer (the controller) drives playback state from it.
    fn take_events(&self) -> Option<tokio_mpsc::UnboundedReceiver<MediaEvent>>;
}

/// Locates the media element inside the player component's markup
///
/// The element is created asynchronously by a third-party component and may
/// not exist on the first attempt; the controller retries `resolve` once per
/// frame until it succeeds, the retry budget runs out, or the controller is
/// detached. Alternate player integrations supply their own resolver.
pub trait MediaHandleResolver: Send + Sync {
    fn resolve(&self) -> Option<Arc<dyn MediaHandle>>;
}
