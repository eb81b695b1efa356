use std::sync::atomic::{AtomicU32, Ordering};

/// Counts resolution calls between unrestricted cleanup sweeps.
///
/// Most calls delete only their own staged leftovers; every `threshold`
/// calls one of them sweeps the whole index for anything still carrying
/// a batch marker. A failed incremental delete pins the counter at the
/// threshold so the very next call sweeps the leak away.
///
/// Two racing calls can both see the threshold and sweep twice; the
/// sweep is idempotent, so that costs a redundant delete and nothing
/// else.
pub(crate) struct CleanupCounter {
    calls: AtomicU32,
    threshold: u32,
}

impl CleanupCounter {
    pub(crate) fn new(threshold: u32) -> Self {
        Self {
            calls: AtomicU32::new(0),
            threshold,
        }
    }

    /// Registers one resolution call; `true` means this call sweeps.
    pub(crate) fn note_call(&self) -> bool {
        let calls = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if calls >= self.threshold {
            self.calls.store(0, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Makes the next call sweep regardless of the count.
    pub(crate) fn force_sweep(&self) {
        self.calls.store(self.threshold, Ordering::Relaxed);
    }
}
