//! Load notifications delivered to the host.
//!
//! Every method has a no-op default, so observers implement only what they
//! display.

/// Receives load progress, readiness and failures.
#[allow(unused_variables)]
pub trait LoadObserver {
    fn download_started(&mut self) {}

    /// `total` is the declared file length once the header has been read.
    fn download_progress(&mut self, loaded: usize, total: Option<usize>) {}

    fn download_completed(&mut self) {}

    /// Atlas packing progress in `[0, 1]`.
    fn texture_progress(&mut self, fraction: f32, message: &str) {}

    /// An object has geometry and its first atlases packed.
    fn object_ready(&mut self, id: u32) {}

    fn coefficients_changed(&mut self, id: u32) {}

    /// The load stopped. No further notifications follow.
    fn fatal_error(&mut self, message: &str) {}

    /// A non-fatal failure, such as an image that did not decode.
    fn load_error(&mut self, message: &str) {}
}

/// Ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl LoadObserver for NoopObserver {}

/// A recorded notification.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent {
    DownloadStarted,
    DownloadProgress { loaded: usize, total: Option<usize> },
    DownloadCompleted,
    TextureProgress { fraction: f32, message: String },
    ObjectReady(u32),
    CoefficientsChanged(u32),
    FatalError(String),
    LoadError(String),
}

/// Records every notification in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    pub events: Vec<LoadEvent>,
}

impl RecordingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&LoadEvent) -> bool) -> usize {
        self.events.iter().filter(|e| predicate(e)).count()
    }
}

impl LoadObserver for RecordingObserver {
    fn download_started(&mut self) {
        self.events.push(LoadEvent::DownloadStarted);
    }

    fn download_progress(&mut self, loaded: usize, total: Option<usize>) {
        self.events.push(LoadEvent::DownloadProgress { loaded, total });
    }

    fn download_completed(&mut self) {
        self.events.push(LoadEvent::DownloadCompleted);
    }

    fn texture_progress(&mut self, fraction: f32, message: &str) {
        self.events.push(LoadEvent::TextureProgress {
            fraction,
            message: message.to_string(),
        });
    }

    fn object_ready(&mut self, id: u32) {
        self.events.push(LoadEvent::ObjectReady(id));
    }

    fn coefficients_changed(&mut self, id: u32) {
        self.events.push(LoadEvent::CoefficientsChanged(id));
    }

    fn fatal_error(&mut self, message: &str) {
        self.events.push(LoadEvent::FatalError(message.to_string()));
    }

    fn load_error(&mut self, message: &str) {
        self.events.push(LoadEvent::LoadError(message.to_string()));
    }
}
