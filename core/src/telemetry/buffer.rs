use std::sync::{Mutex, MutexGuard};

use crate::interface::Timestamped;

pub const DEFAULT_CAPACITY: usize = 10;

struct Ring<T> {
    slots: Vec<T>,
    /// Slot the next append writes; the oldest sample once the ring is full.
    next: usize,
}

/// Fixed-capacity, oldest-overwrite history of one sensor stream.
///
/// Reads and writes are serialized by the buffer's own lock, so a reader never sees a
/// half-written sample. Buffers share no state with each other.
pub struct TelemetryBuffer<T> {
    inner: Mutex<Ring<T>>,
    capacity: usize,
}

impl<T: Clone + Timestamped> TelemetryBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Ring {
                slots: Vec::with_capacity(capacity),
                next: 0,
            }),
            capacity,
        }
    }

    fn ring(&self) -> MutexGuard<'_, Ring<T>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.ring().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring().slots.is_empty()
    }

    pub fn append(&self, sample: T) {
        let mut ring = self.ring();
        let next = ring.next;
        if ring.slots.len() < self.capacity {
            ring.slots.push(sample);
        } else {
            ring.slots[next] = sample;
        }
        ring.next = (next + 1) % self.capacity;
    }

    pub fn latest(&self) -> Option<T> {
        let ring = self.ring();
        if ring.slots.is_empty() {
            return None;
        }
        let newest = (ring.next + self.capacity - 1) % self.capacity;
        ring.slots.get(newest).cloned()
    }

    /// Sample closest in time to `target_ms`.
    ///
    /// Slots are scanned in storage order, so after wraparound a tie may resolve to a newer
    /// sample ahead of an older one.
    pub fn nearest(&self, target_ms: u64) -> Option<T> {
        let ring = self.ring();
        let mut best: Option<(&T, u64)> = None;
        for sample in &ring.slots {
            let distance = sample.timestamp_ms().abs_diff(target_ms);
            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((sample, distance)),
            }
        }
        best.map(|(sample, _)| sample.clone())
    }

    /// Contents oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        let ring = self.ring();
        if ring.slots.len() < self.capacity {
            return ring.slots.clone();
        }
        let (newer, older) = ring.slots.split_at(ring.next);
        older.iter().chain(newer.iter()).cloned().collect()
    }
}

impl<T: Clone + Timestamped> Default for TelemetryBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::PressureData;
    use std::sync::Arc;
    use std::thread;

    fn pressure(timestamp_ms: u64) -> PressureData {
        PressureData {
            timestamp_ms,
            press_abs: 1013.25,
            press_diff: 0.0,
        }
    }

    fn timestamps(buffer: &TelemetryBuffer<PressureData>) -> Vec<u64> {
        buffer.snapshot().iter().map(|sample| sample.timestamp_ms).collect()
    }

    #[test]
    fn overflow_evicts_oldest() {
        let buffer = TelemetryBuffer::new(10);
        for t in 0..11 {
            buffer.append(pressure(t));
        }
        assert_eq!(buffer.len(), 10);
        assert_eq!(timestamps(&buffer), (1..11).collect::<Vec<_>>());
        assert_eq!(buffer.latest().map(|sample| sample.timestamp_ms), Some(10));
    }

    #[test]
    fn empty_buffer_has_no_answers() {
        let buffer: TelemetryBuffer<PressureData> = TelemetryBuffer::default();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), DEFAULT_CAPACITY);
        assert!(buffer.latest().is_none());
        assert!(buffer.nearest(5).is_none());
    }

    #[test]
    fn nearest_picks_minimal_distance() {
        let buffer = TelemetryBuffer::new(10);
        for t in [1, 5, 9] {
            buffer.append(pressure(t));
        }
        assert_eq!(buffer.nearest(6).map(|sample| sample.timestamp_ms), Some(5));
        assert_eq!(buffer.nearest(100).map(|sample| sample.timestamp_ms), Some(9));
        assert_eq!(buffer.nearest(0).map(|sample| sample.timestamp_ms), Some(1));
    }

    #[test]
    fn nearest_ties_follow_storage_order() {
        let buffer = TelemetryBuffer::new(3);
        for t in [10, 20, 30, 0] {
            buffer.append(pressure(t));
        }
        // Slots hold [0, 20, 30]; 0 and 20 are equally far from 10.
        assert_eq!(buffer.nearest(10).map(|sample| sample.timestamp_ms), Some(0));
        assert_eq!(timestamps(&buffer), vec![20, 30, 0]);
    }

    #[test]
    fn zero_capacity_holds_one_sample() {
        let buffer = TelemetryBuffer::new(0);
        buffer.append(pressure(1));
        buffer.append(pressure(2));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.latest().map(|sample| sample.timestamp_ms), Some(2));
    }

    #[test]
    fn concurrent_writers_keep_capacity() {
        let buffer = Arc::new(TelemetryBuffer::new(10));
        let writers: Vec<_> = (0..4)
            .map(|writer| {
                let buffer = Arc::clone(&buffer);
                thread::spawn(move || {
                    for t in 0..250 {
                        buffer.append(pressure(writer * 1000 + t));
                        let _ = buffer.nearest(t);
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(buffer.len(), 10);
    }
}
