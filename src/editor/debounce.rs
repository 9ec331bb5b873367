//! Change batching
//!
//! Patches that arrive within the debounce window of each other are merged
//! into one list. Each new change pushes the deadline back, so a burst is
//! released as a whole once it has been quiet for a full window.

use crate::document::PatchOp;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct ChangeDebouncer {
    window: Duration,
    pending: Vec<PatchOp>,
    deadline: Option<Instant>,
}

impl ChangeDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Vec::new(),
            deadline: None,
        }
    }

    /// Record a change. An empty list still schedules a release.
    pub fn push(&mut self, patches: &[PatchOp], now: Instant) {
        self.pending.extend_from_slice(patches);
        self.deadline = Some(now + self.window);
    }

    /// The accumulated patches, once the window has passed
    pub fn poll(&mut self, now: Instant) -> Option<Vec<PatchOp>> {
        match self.deadline {
            Some(deadline) if now >= deadline => self.flush(),
            _ => None,
        }
    }

    /// Release whatever is pending right away
    pub fn flush(&mut self) -> Option<Vec<PatchOp>> {
        self.deadline.take()?;
        Some(std::mem::take(&mut self.pending))
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left until the next release
    pub fn time_until_release(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Path;

    fn op(from: &str, to: &str) -> PatchOp {
        PatchOp::moving(Path::parse(from), Path::parse(to))
    }

    #[test]
    fn test_burst_is_released_once() {
        let start = Instant::now();
        let window = Duration::from_millis(10);
        let mut debouncer = ChangeDebouncer::new(window);

        debouncer.push(&[op("/children/0", "/children/1")], start);
        debouncer.push(&[op("/children/1", "/children/2")], start + Duration::from_millis(6));
        assert_eq!(debouncer.poll(start + Duration::from_millis(12)), None);

        let released = debouncer.poll(start + Duration::from_millis(16)).unwrap();
        assert_eq!(released, vec![op("/children/0", "/children/1"), op("/children/1", "/children/2")]);
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.poll(start + Duration::from_secs(1)), None);
    }

    #[test]
    fn test_empty_push_schedules_release() {
        let start = Instant::now();
        let mut debouncer = ChangeDebouncer::new(Duration::from_millis(10));
        debouncer.push(&[], start);
        assert_eq!(debouncer.time_until_release(start), Some(Duration::from_millis(10)));
        assert_eq!(debouncer.poll(start + Duration::from_millis(10)), Some(Vec::new()));
    }

    #[test]
    fn test_flush_without_changes() {
        let mut debouncer = ChangeDebouncer::new(Duration::from_millis(10));
        assert_eq!(debouncer.flush(), None);
    }
}
