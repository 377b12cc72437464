/// Cooperative abort request shared between the acquisition loop and other threads.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct Flag(std::sync::Arc<std::sync::atomic::AtomicBool>);

impl Flag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, std::sync::atomic::Ordering::Release);
    }

    pub fn clear(&self) {
        self.0.store(false, std::sync::atomic::Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::Acquire)
    }

    /// Clears the flag and returns whether it was raised.
    pub fn take(&self) -> bool {
        self.0.swap(false, std::sync::atomic::Ordering::AcqRel)
    }
}
