// Library exports for hosts embedding the lesson player core

pub mod chapters;
pub mod config;
pub mod controller;
pub mod events;
pub mod media;
pub mod models;
pub mod progress;
pub mod session;
pub mod state;

pub use config::PlayerConfig;
pub use controller::{ControllerContext, ControllerPhase, VideoController};
pub use events::{EventBus, EventKind, PlayerEvent, Subscription};
pub use session::{LessonDescriptor, LessonSession, SessionDeps};
pub use state::{PlaybackState, VideoStateStore};

// Test support (only available with test-utils feature)
#[cfg(feature = "test-utils")]
pub mod test_support;
