use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cancellation flag shared between the frame loop and the teardown path.
///
/// Clones observe the same flag. Once stopped it never resets; a remount
/// creates a new handle instead.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// True if both handles share one flag.
    pub fn same_as(&self, other: &StopHandle) -> bool {
        Arc::ptr_eq(&self.stopped, &other.stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_flag() {
        let a = StopHandle::new();
        let b = a.clone();
        assert!(!b.is_stopped());
        a.stop();
        assert!(b.is_stopped());
        assert!(a.same_as(&b));
    }

    #[test]
    fn new_handles_are_independent() {
        let a = StopHandle::new();
        let b = StopHandle::new();
        a.stop();
        assert!(!b.is_stopped());
        assert!(!a.same_as(&b));
    }
}
