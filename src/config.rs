use std::time::Duration;

/// Player configuration
///
/// Defaults match production behavior; individual knobs can be overridden via
/// `PLAYHEAD_*` environment variables (a `.env` file is honored in debug
/// builds).
#[derive(Clone, Debug)]
pub struct PlayerConfig {
    /// Minimum spacing between two progress reports for the same lesson
    pub report_interval: Duration,
    /// Cached positions at or below this many seconds do not trigger a resume seek
    pub resume_threshold_seconds: f64,
    /// Delay between media-element resolution attempts (one frame at ~60fps)
    pub resolve_frame_interval: Duration,
    /// Maximum number of resolution attempts before giving up with an error.
    /// `None` retries until the controller is detached.
    pub resolve_retry_budget: Option<u32>,
    /// Base URL for HLS stream URLs derived from a playback id
    pub stream_base_url: String,
    /// Base URL for poster/thumbnail URLs derived from a playback id
    pub poster_base_url: String,
    /// Endpoint of the chapter/transcript service
    pub chapters_url: String,
    /// Endpoint of the progress API
    pub progress_url: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            report_interval: Duration::from_secs(5),
            resume_threshold_seconds: 5.0,
            resolve_frame_interval: Duration::from_millis(16),
            resolve_retry_budget: None,
            stream_base_url: "https://stream.mux.com".to_string(),
            poster_base_url: "https://image.mux.com".to_string(),
            chapters_url: "https://api.coursehub.dev/ai/chapters".to_string(),
            progress_url: "https://api.coursehub.dev/lessons/progress".to_string(),
        }
    }
}

impl PlayerConfig {
    /// Load configuration, applying environment overrides on top of defaults
    pub fn load() -> Self {
        #[cfg(debug_assertions)]
        {
            if dotenvy::dotenv().is_ok() {
                tracing::debug!("Loaded .env file");
            }
        }

        Self::from_env()
    }

    fn from_env() -> Self {
        let mut config = PlayerConfig::default();

        if let Some(secs) = env_f64("PLAYHEAD_REPORT_INTERVAL_SECS") {
            config.report_interval = Duration::from_secs_f64(secs);
        }
        if let Some(secs) = env_f64("PLAYHEAD_RESUME_THRESHOLD_SECS") {
            config.resume_threshold_seconds = secs;
        }
        if let Ok(value) = std::env::var("PLAYHEAD_RESOLVE_RETRY_BUDGET") {
            config.resolve_retry_budget = value.parse().ok();
        }
        if let Ok(url) = std::env::var("PLAYHEAD_STREAM_BASE_URL") {
            config.stream_base_url = url;
        }
        if let Ok(url) = std::env::var("PLAYHEAD_POSTER_BASE_URL") {
            config.poster_base_url = url;
        }
        if let Ok(url) = std::env::var("PLAYHEAD_CHAPTERS_URL") {
            config.chapters_url = url;
        }
        if let Ok(url) = std::env::var("PLAYHEAD_PROGRESS_URL") {
            config.progress_url = url;
        }

        config
    }

    /// HLS stream URL for a playback id
    pub fn stream_url(&self, playback_id: &str) -> String {
        format!("{}/{}.m3u8", self.stream_base_url, playback_id)
    }

    /// Poster image URL for a playback id
    pub fn poster_url(&self, playback_id: &str) -> String {
        format!("{}/{}/thumbnail.jpg", self.poster_base_url, playback_id)
    }
}

fn env_f64(name: &str) -> Option<f64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
