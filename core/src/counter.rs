use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic cursor handing out disjoint index ranges to the producer.
///
/// Each `fetch_add(n)` claims `[previous, previous + n)`; concurrent callers
/// never receive overlapping ranges.
#[derive(Debug, Default)]
pub struct AtomicCounter {
    value: AtomicU64,
}

impl AtomicCounter {
    pub fn new(start: u64) -> Self {
        Self {
            value: AtomicU64::new(start),
        }
    }

    /// Returns the previous value after advancing the cursor by `n`.
    pub fn fetch_add(&self, n: u64) -> u64 {
        self.value.fetch_add(n, Ordering::Relaxed)
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fetch_add_returns_previous_value() {
        let counter = AtomicCounter::new(5);
        assert_eq!(counter.fetch_add(3), 5);
        assert_eq!(counter.fetch_add(3), 8);
        assert_eq!(counter.get(), 11);
    }

    #[test]
    fn concurrent_ranges_partition_the_index_space() {
        const THREADS: usize = 8;
        const CLAIMS: usize = 1_000;
        const STEP: u64 = 3;

        let counter = Arc::new(AtomicCounter::new(0));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    (0..CLAIMS)
                        .map(|_| counter.fetch_add(STEP))
                        .collect::<Vec<u64>>()
                })
            })
            .collect();

        let mut starts: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        starts.sort_unstable();

        assert_eq!(starts.len(), THREADS * CLAIMS);
        for (i, start) in starts.iter().enumerate() {
            assert_eq!(*start, i as u64 * STEP);
        }
        assert_eq!(counter.get(), (THREADS * CLAIMS) as u64 * STEP);
    }
}
