use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::FrameError;

/// Something that records and submits one frame at a time.
///
/// Implementations own every GPU handle they touch and are only ever driven
/// from the render thread, one frame at a time.
pub trait FrameRenderer {
    /// Encode, submit and present one frame.
    fn render_frame(&mut self) -> Result<(), FrameError>;

    /// Destroy GPU resources explicitly. Called once, after the loop stopped.
    fn release(&mut self) {}
}

/// The host's "call me again next frame" primitive.
pub trait FrameRequester {
    fn request_frame(&self);
}

impl<T: FrameRequester + ?Sized> FrameRequester for Arc<T> {
    fn request_frame(&self) {
        (**self).request_frame()
    }
}

/// Frame requester for hosts without a display: requests are counted and
/// the host drains them with [`ManualRequester::take_request`].
#[derive(Debug, Clone, Default)]
pub struct ManualRequester {
    pending: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
}

impl ManualRequester {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one pending request. Returns false if none was pending.
    pub fn take_request(&self) -> bool {
        self.pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Number of requests ever made.
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }
}

impl FrameRequester for ManualRequester {
    fn request_frame(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.total.fetch_add(1, Ordering::AcqRel);
    }
}
