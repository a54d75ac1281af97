use std::time::Duration;

use tokio::time::Instant;

/// Longest silence one request can ask for.
pub const MAX_SILENCE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Temporary suspension of plain-message processing.
///
/// The deadline is the timer: a new `silence_for` replaces it, `lift` clears
/// it, and it expires on its own once `now` passes it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SilenceState {
    until: Option<Instant>,
}

impl SilenceState {
    /// `duration` is capped at [`MAX_SILENCE`].
    pub fn silence_for(&mut self, now: Instant, duration: Duration) {
        let duration = duration.min(MAX_SILENCE);
        self.until = now.checked_add(duration).or(self.until);
    }

    /// Returns whether silence was active.
    pub fn lift(&mut self, now: Instant) -> bool {
        let was = self.is_active(now);
        self.until = None;
        was
    }

    pub fn is_active(&self, now: Instant) -> bool {
        self.until.is_some_and(|t| now < t)
    }
}
