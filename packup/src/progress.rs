//! Observable progress model shared between the updater and its frontend.
//!
//! The updater owns a [`ProgressCell`] that it writes to while working, frontends
//! read snapshots of it at their own pace. Sub-tasks write through a
//! [`ProgressFilter`] that linearly maps their local progress into a sub-range of
//! the overall range.

use std::sync::{Arc, Mutex};


/// Fraction value signaling an indeterminate progress.
pub const INDETERMINATE: f64 = -1.0;

/// A progress snapshot, the fraction is in range `[-1, 1]` where `-1` signals an
/// indeterminate state, the status is a stable key for the locale collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub fraction: f64,
    pub status: Box<str>,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            fraction: INDETERMINATE,
            status: Box::from("status.idle"),
        }
    }
}

/// Single-writer, many-reader cell holding the latest progress snapshot.
#[derive(Debug, Clone, Default)]
pub struct ProgressCell {
    inner: Arc<Mutex<Progress>>,
}

impl ProgressCell {

    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new snapshot, the fraction is clamped to `[-1, 1]`.
    pub fn set(&self, fraction: f64, status: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fraction = fraction.clamp(-1.0, 1.0);
        if &*inner.status != status {
            inner.status = Box::from(status);
        }
    }

    /// Return a copy of the latest published snapshot.
    pub fn snapshot(&self) -> Progress {
        self.inner.lock().unwrap().clone()
    }

}

/// Adapter mapping a local `[0, 1]` progress into the `[lo, hi]` sub-range of the
/// underlying cell. An indeterminate fraction is passed through unchanged.
#[derive(Debug, Clone)]
pub struct ProgressFilter {
    cell: ProgressCell,
    lo: f64,
    hi: f64,
}

impl ProgressFilter {

    pub fn new(cell: ProgressCell, lo: f64, hi: f64) -> Self {
        debug_assert!(lo <= hi);
        Self { cell, lo, hi }
    }

    pub fn set(&self, fraction: f64, status: &str) {
        if fraction < 0.0 {
            self.cell.set(INDETERMINATE, status);
        } else {
            self.cell.set(self.lo + (self.hi - self.lo) * fraction.clamp(0.0, 1.0), status);
        }
    }

}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn filter_maps_sub_range() {

        let cell = ProgressCell::new();
        let filter = ProgressFilter::new(cell.clone(), 0.0, 0.98);

        filter.set(0.0, "status.download");
        assert_eq!(cell.snapshot().fraction, 0.0);

        filter.set(0.5, "status.download");
        assert_eq!(cell.snapshot().fraction, 0.49);

        filter.set(1.0, "status.download");
        assert_eq!(cell.snapshot().fraction, 0.98);

        let filter = ProgressFilter::new(cell.clone(), 0.98, 1.0);
        filter.set(1.0, "status.install");

        let snapshot = cell.snapshot();
        assert_eq!(snapshot.fraction, 1.0);
        assert_eq!(&*snapshot.status, "status.install");

    }

    #[test]
    fn indeterminate_passes_through() {
        let cell = ProgressCell::new();
        let filter = ProgressFilter::new(cell.clone(), 0.5, 0.9);
        filter.set(INDETERMINATE, "status.resolve");
        assert_eq!(cell.snapshot().fraction, INDETERMINATE);
    }

}
