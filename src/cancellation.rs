use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared token letting a caller stop waiting on a running command.
///
/// The first [`Cancellation::cancel`] is a soft cancellation: the command currently running
/// is left to finish on its own. Any further call turns it into a hard cancellation and the
/// runner kills the child process.
#[derive(Debug, Default)]
pub struct Cancellation {
    /// How many times cancellation was requested
    count: AtomicUsize,
}

impl Cancellation {
    pub fn cancel(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn is_soft_cancellation(&self) -> bool {
        self.count.load(Ordering::Relaxed) == 1
    }

    pub fn is_hard_cancellation(&self) -> bool {
        self.count.load(Ordering::Relaxed) > 1
    }

    pub fn is_cancelled(&self) -> bool {
        self.count.load(Ordering::Relaxed) > 0
    }
}
