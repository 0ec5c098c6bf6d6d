use std::sync::{Mutex, MutexGuard, PoisonError};

/// Capacity of a freshly allocated buffer.
pub const INITIAL_CAPACITY: usize = 8;

/// Drained vectors larger than this are released instead of reused.
pub const RECYCLE_LIMIT: usize = 128;

/// Ordered, append-only, in-memory sequence of not yet persisted records.
///
/// Producers only ever append. The flusher takes the whole content at once
/// with [`EntryBuffer::swap_into`], so the lock is never held during I/O.
/// Once sealed the buffer refuses new records, which lets the final flush
/// see everything that was ever accepted.
#[derive(Debug)]
pub struct EntryBuffer<T> {
    state: Mutex<State<T>>,
}

#[derive(Debug)]
struct State<T> {
    entries: Vec<T>,
    sealed: bool,
}

impl<T> Default for EntryBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EntryBuffer<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                entries: Vec::with_capacity(INITIAL_CAPACITY),
                sealed: false,
            }),
        }
    }

    /// Append `entry`, or hand it back if the buffer is sealed.
    pub fn push(&self, entry: T) -> Result<(), T> {
        let mut state = self.lock();
        if state.sealed {
            return Err(entry);
        }
        state.entries.push(entry);
        Ok(())
    }

    /// Refuse every later push. Records already buffered stay drainable.
    pub fn seal(&self) {
        self.lock().sealed = true;
    }

    /// Exchange the buffered records with `spare`, which must be empty.
    ///
    /// On return `spare` holds every record appended so far, oldest first.
    pub fn swap_into(&self, spare: &mut Vec<T>) {
        debug_assert!(spare.is_empty());
        std::mem::swap(&mut self.lock().entries, spare);
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    // A panic while pushing cannot leave the Vec half-updated.
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Empty a drained vector so it can become the next spare.
pub fn recycle<T>(batch: &mut Vec<T>) {
    if batch.capacity() > RECYCLE_LIMIT {
        *batch = Vec::with_capacity(INITIAL_CAPACITY);
    } else {
        batch.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn swap_takes_everything_in_order() {
        let buffer = EntryBuffer::new();
        for i in 0..5 {
            buffer.push(i).unwrap();
        }
        let mut batch = Vec::new();
        buffer.swap_into(&mut batch);
        assert_eq!(batch, vec![0, 1, 2, 3, 4]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn pushes_after_swap_land_in_next_batch() {
        let buffer = EntryBuffer::new();
        buffer.push("a").unwrap();
        let mut first = Vec::new();
        buffer.swap_into(&mut first);
        buffer.push("b").unwrap();
        assert_eq!(first, vec!["a"]);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn sealed_buffer_refuses_but_keeps_pending() {
        let buffer = EntryBuffer::new();
        buffer.push(1).unwrap();
        buffer.seal();
        assert_eq!(buffer.push(2), Err(2));

        let mut batch = Vec::new();
        buffer.swap_into(&mut batch);
        assert_eq!(batch, vec![1]);
    }

    #[test]
    fn recycle_keeps_small_vectors() {
        let mut batch: Vec<u32> = Vec::with_capacity(64);
        batch.extend(0..10);
        recycle(&mut batch);
        assert!(batch.is_empty());
        assert_eq!(batch.capacity(), 64);
    }

    #[test]
    fn recycle_releases_large_vectors() {
        let mut batch: Vec<u32> = (0..1000).collect();
        recycle(&mut batch);
        assert!(batch.is_empty());
        assert!(batch.capacity() <= RECYCLE_LIMIT);
    }

    #[test]
    fn concurrent_pushes_are_all_kept() {
        let buffer = Arc::new(EntryBuffer::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        buffer.push((t, i)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let mut batch = Vec::new();
        buffer.swap_into(&mut batch);
        assert_eq!(batch.len(), 800);
        for t in 0..8 {
            let seq: Vec<_> = batch.iter().filter(|(p, _)| *p == t).map(|(_, i)| *i).collect();
            assert_eq!(seq, (0..100).collect::<Vec<_>>());
        }
    }
}
