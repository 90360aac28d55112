// arc_track.rs
//! Retain/release accounting for ARC balance checks.
//!
//! Counters are thread-local: generated code runs on the calling thread, so
//! tests running in parallel only see their own traffic.

use std::cell::Cell;

thread_local! {
    static COUNTS: Cell<ArcCounts> = const {
        Cell::new(ArcCounts {
            retains: 0,
            releases: 0,
            allocs: 0,
            frees: 0,
        })
    };
}

/// Snapshot of the ARC counters on the current thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArcCounts {
    pub retains: u64,
    pub releases: u64,
    pub allocs: u64,
    pub frees: u64,
}

impl ArcCounts {
    /// Counts accumulated since `earlier` was taken.
    pub fn since(self, earlier: ArcCounts) -> ArcCounts {
        ArcCounts {
            retains: self.retains - earlier.retains,
            releases: self.releases - earlier.releases,
            allocs: self.allocs - earlier.allocs,
            frees: self.frees - earlier.frees,
        }
    }

    /// Every allocation was freed and every retain matched by a release.
    pub fn is_balanced(&self) -> bool {
        self.retains == self.releases && self.allocs == self.frees
    }
}

fn update(f: impl FnOnce(&mut ArcCounts)) {
    COUNTS.with(|counts| {
        let mut current = counts.get();
        f(&mut current);
        counts.set(current);
    });
}

#[inline]
pub fn record_retain() {
    update(|c| c.retains += 1);
}

#[inline]
pub fn record_release() {
    update(|c| c.releases += 1);
}

#[inline]
pub fn record_alloc() {
    update(|c| c.allocs += 1);
}

#[inline]
pub fn record_free() {
    update(|c| c.frees += 1);
}

/// Snapshot the counters of the current thread.
pub fn snapshot() -> ArcCounts {
    COUNTS.with(Cell::get)
}

/// Reset the counters of the current thread to zero.
pub fn reset() {
    COUNTS.with(|counts| counts.set(ArcCounts::default()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_per_thread() {
        reset();
        record_alloc();
        record_retain();
        record_release();
        record_free();
        let counts = snapshot();
        assert_eq!(counts.retains, 1);
        assert_eq!(counts.allocs, 1);
        assert!(counts.is_balanced());

        let other = std::thread::spawn(snapshot).join().unwrap();
        assert_eq!(other, ArcCounts::default());
    }

    #[test]
    fn since_subtracts_snapshot() {
        let before = snapshot();
        record_retain();
        record_retain();
        record_release();
        let delta = snapshot().since(before);
        assert_eq!(delta.retains, 2);
        assert_eq!(delta.releases, 1);
        assert!(!delta.is_balanced());
    }
}
