//! Load notifications written to the log.

use yxv::LoadObserver;

/// Logs load notifications and remembers failures for the summary.
#[derive(Debug, Default)]
pub struct LogObserver {
    pub load_errors: Vec<String>,
    last_percent: Option<u32>,
}

impl LoadObserver for LogObserver {
    fn download_started(&mut self) {
        tracing::info!("reading model");
    }

    fn download_progress(&mut self, loaded: usize, total: Option<usize>) {
        tracing::debug!(loaded, ?total, "read bytes");
    }

    fn download_completed(&mut self) {
        tracing::info!("model read");
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn texture_progress(&mut self, fraction: f32, message: &str) {
        // Log each whole percent once.
        let percent = (fraction * 100.0) as u32;
        if self.last_percent != Some(percent) {
            self.last_percent = Some(percent);
            tracing::info!(percent, "{message}");
        }
    }

    fn object_ready(&mut self, id: u32) {
        tracing::info!(id, "object ready");
    }

    fn coefficients_changed(&mut self, id: u32) {
        tracing::trace!(id, "coefficients updated");
    }

    fn fatal_error(&mut self, message: &str) {
        tracing::error!("{message}");
    }

    fn load_error(&mut self, message: &str) {
        tracing::warn!("{message}");
        self.load_errors.push(message.to_string());
    }
}
