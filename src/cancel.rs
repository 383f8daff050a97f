use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cooperative cancellation flag.
///
/// Clones observe the same flag. Long-running work polls it at phase and
/// iteration boundaries; nothing is interrupted mid-phase.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[inline(always)]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
