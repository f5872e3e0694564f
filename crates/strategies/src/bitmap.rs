use std::sync::atomic::{AtomicU8, Ordering};

/// A per-section "has this byte been decoded" bitmap, shared read/write
/// across the recursive strategy's worker threads.
///
/// Updates are byte-granular read-modify-write on individual [`AtomicU8`]
/// lanes with [`Ordering::Relaxed`]: races on a single bit are harmless,
/// setting a bit twice is idempotent, and a worker that misses a concurrent
/// set only re-decodes a little redundant ground, which the finalizer's
/// partition pass tolerates by construction.
pub struct VisitedBitmap {
    bits: Vec<AtomicU8>,
    len: usize,
}

impl VisitedBitmap {
    /// Build a bitmap covering `len` byte offsets, all initially clear.
    pub fn new(len: usize) -> Self {
        let byte_count = len.div_ceil(8);

        Self { bits: (0..byte_count).map(|_| AtomicU8::new(0)).collect(), len }
    }

    /// Whether offset `index` has been decoded. Out-of-range offsets report
    /// as visited, so callers never need a separate bounds check before
    /// consulting the bitmap.
    pub fn is_set(&self, index: usize) -> bool {
        if index >= self.len {
            return true;
        }

        self.bits[index / 8].load(Ordering::Relaxed) & (1 << (index % 8)) != 0
    }

    /// Mark offset `index` as decoded. A no-op if `index` is out of range.
    pub fn set(&self, index: usize) {
        if index >= self.len {
            return;
        }

        self.bits[index / 8].fetch_or(1 << (index % 8), Ordering::Relaxed);
    }

    /// Mark every offset in `range` as decoded.
    pub fn set_range(&self, range: std::ops::Range<usize>) {
        for index in range {
            self.set(index);
        }
    }

    /// Iterate the offsets still clear, address-ascending, for the
    /// finalizer's data-fill pass.
    pub fn iter_unset(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |&index| !self.is_set(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_is_set() {
        let bitmap = VisitedBitmap::new(16);

        assert!(!bitmap.is_set(5));
        bitmap.set(5);
        assert!(bitmap.is_set(5));
        assert!(!bitmap.is_set(4));
    }

    #[test]
    fn test_set_range_marks_every_offset() {
        let bitmap = VisitedBitmap::new(8);
        bitmap.set_range(2..5);

        assert_eq!(bitmap.iter_unset().collect::<Vec<_>>(), vec![0, 1, 5, 6, 7]);
    }

    #[test]
    fn test_out_of_range_offset_reports_visited() {
        let bitmap = VisitedBitmap::new(4);

        assert!(bitmap.is_set(100));
    }

    #[test]
    fn test_spans_multiple_bytes() {
        let bitmap = VisitedBitmap::new(20);
        bitmap.set_range(0..20);

        assert_eq!(bitmap.iter_unset().count(), 0);
    }
}
