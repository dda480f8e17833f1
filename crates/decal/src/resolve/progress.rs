use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts resolved images against the number a scene expects.
///
/// The counter is shared between the resolver, which records one tick per
/// `resolve` call, and whoever asks whether the scene is ready to export.
#[derive(Debug, Default)]
pub struct LoadProgress {
    loaded: AtomicUsize,
    expected: AtomicUsize,
}

impl LoadProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new round expecting `expected` resolves.
    pub fn expect(&self, expected: usize) {
        self.loaded.store(0, Ordering::SeqCst);
        self.expected.store(expected, Ordering::SeqCst);
    }

    /// Records one finished resolve, whatever its outcome.
    pub fn record(&self) {
        self.loaded.fetch_add(1, Ordering::SeqCst);
    }

    pub fn loaded(&self) -> usize {
        self.loaded.load(Ordering::SeqCst)
    }

    pub fn expected(&self) -> usize {
        self.expected.load(Ordering::SeqCst)
    }

    /// Returns `true` once every expected image has been resolved.
    pub fn is_ready(&self) -> bool {
        self.loaded() >= self.expected()
    }
}
