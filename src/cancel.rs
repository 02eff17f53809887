use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cooperative cancellation flag shared between a session and its callers.
///
/// Setting it never interrupts a fetch in progress; the session observes it
/// before the next fetch.
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::CancellationFlag;

    #[test]
    fn clones_share_state() {
        let flag = CancellationFlag::new();
        let handle = flag.clone();
        assert!(!flag.is_cancelled());

        handle.cancel();
        handle.cancel();
        assert!(flag.is_cancelled());

        flag.reset();
        assert!(!handle.is_cancelled());
    }

    #[test]
    fn visible_across_threads() {
        let flag = CancellationFlag::new();
        let handle = flag.clone();
        std::thread::spawn(move || handle.cancel())
            .join()
            .expect("cancel thread must not panic");
        assert!(flag.is_cancelled());
    }
}
