use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::LayoutError;

/// Cooperative cancellation signal shared between a caller and a running computation.
///
/// Clones observe the same flag. Algorithms poll it at the top of every outer
/// iteration and at least once per vertex or edge pass.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// `Err(LayoutError::Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<(), LayoutError> {
        if self.is_cancelled() {
            Err(LayoutError::Cancelled)
        } else {
            Ok(())
        }
    }
}
