//! The published sample store, shared between the producer and any number of readers.
//!
//! Values live behind a critical-section mutex, as they are wider than what every target reads
//! atomically. Update counters are atomics so they can be polled without masking the producer.
//! The producer stores a value before bumping its counters with `Release` ordering; a reader
//! that observes a new counter value with `Acquire` ordering therefore observes the value too.

use core::cell::Cell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use portable_atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering};

use crate::{Error, MAX_CHANNELS};

pub(crate) struct SampleStore {
    values: Mutex<CriticalSectionRawMutex, [Cell<u16>; MAX_CHANNELS]>,
    sequences: [AtomicU8; MAX_CHANNELS],
    generations: [AtomicU32; MAX_CHANNELS],
    /// Number of channels of the running session, 0 when idle.
    channel_count: AtomicUsize,
    /// Bumped by every [`Self::reset()`], so waiters can tell a restarted session apart.
    epoch: AtomicU32,
}

impl SampleStore {
    pub const fn new() -> Self {
        Self {
            values: Mutex::new([const { Cell::new(0) }; MAX_CHANNELS]),
            sequences: [const { AtomicU8::new(0) }; MAX_CHANNELS],
            generations: [const { AtomicU32::new(0) }; MAX_CHANNELS],
            channel_count: AtomicUsize::new(0),
            epoch: AtomicU32::new(0),
        }
    }

    /// Zeroes every slot and marks `channel_count` channels as readable.
    ///
    /// Must only be called while the producer cannot run.
    pub fn reset(&self, channel_count: usize) {
        self.epoch.fetch_add(1, Ordering::Release);
        self.values.lock(|values| {
            for value in values {
                value.set(0);
            }
        });
        for sequence in &self.sequences {
            sequence.store(0, Ordering::Release);
        }
        for generation in &self.generations {
            generation.store(0, Ordering::Release);
        }
        self.channel_count.store(channel_count, Ordering::Release);
    }

    /// Marks the store as idle; index checks fail until the next [`Self::reset()`].
    pub fn close(&self) {
        self.channel_count.store(0, Ordering::Release);
    }

    pub fn epoch(&self) -> u32 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count.load(Ordering::Acquire)
    }

    /// Checks that `channel` belongs to the running session.
    pub fn check(&self, channel: usize) -> Result<(), Error> {
        let channel_count = self.channel_count();
        if channel < channel_count {
            Ok(())
        } else if channel_count == 0 {
            Err(Error::NotRunning)
        } else {
            Err(Error::ChannelOutOfRange {
                channel,
                channel_count,
            })
        }
    }

    /// Publishes a new value for `channel`. Producer only.
    pub fn publish(&self, channel: usize, value: u16) {
        self.values.lock(|values| {
            if let Some(slot) = values.get(channel) {
                slot.set(value);
            }
        });
        if let Some(sequence) = self.sequences.get(channel) {
            sequence.fetch_add(1, Ordering::Release);
        }
        if let Some(generation) = self.generations.get(channel) {
            generation.fetch_add(1, Ordering::Release);
        }
    }

    pub fn value(&self, channel: usize) -> Result<u16, Error> {
        self.check(channel)?;
        Ok(self
            .values
            .lock(|values| values.get(channel).map_or(0, Cell::get)))
    }

    pub fn sequence(&self, channel: usize) -> Result<u8, Error> {
        self.check(channel)?;
        Ok(self
            .sequences
            .get(channel)
            .map_or(0, |sequence| sequence.load(Ordering::Acquire)))
    }

    pub fn generation(&self, channel: usize) -> Result<u32, Error> {
        self.check(channel)?;
        Ok(self.raw_generation(channel))
    }

    /// Reads a generation counter without checking the session, for spin loops that already did.
    pub fn raw_generation(&self, channel: usize) -> u32 {
        self.generations
            .get(channel)
            .map_or(0, |generation| generation.load(Ordering::Acquire))
    }

    /// Copies the first `out.len()` values in one critical section, so that they are consistent
    /// with each other. Returns the number of values copied.
    pub fn snapshot(&self, out: &mut [u16]) -> usize {
        let count = self.channel_count().min(out.len());
        self.values.lock(|values| {
            for (dst, src) in out.iter_mut().zip(values.iter()).take(count) {
                *dst = src.get();
            }
        });
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_store_rejects_reads() {
        let store = SampleStore::new();
        assert_eq!(store.value(0), Err(Error::NotRunning));
        assert_eq!(store.sequence(0), Err(Error::NotRunning));
    }

    #[test]
    fn publish_bumps_counters_by_one() {
        let store = SampleStore::new();
        store.reset(2);
        store.publish(1, 42);
        assert_eq!(store.value(1), Ok(42));
        assert_eq!(store.sequence(1), Ok(1));
        assert_eq!(store.generation(1), Ok(1));
        assert_eq!(store.sequence(0), Ok(0));
    }

    #[test]
    fn sequence_wraps_while_generation_keeps_counting() {
        let store = SampleStore::new();
        store.reset(1);
        for i in 0..300u16 {
            store.publish(0, i);
        }
        assert_eq!(store.sequence(0), Ok(44)); // 300 mod 256
        assert_eq!(store.generation(0), Ok(300));
        assert_eq!(store.value(0), Ok(299));
    }

    #[test]
    fn out_of_range_channel_is_rejected() {
        let store = SampleStore::new();
        store.reset(3);
        assert_eq!(
            store.value(3),
            Err(Error::ChannelOutOfRange {
                channel: 3,
                channel_count: 3
            })
        );
    }

    #[test]
    fn reset_clears_previous_session() {
        let store = SampleStore::new();
        store.reset(2);
        store.publish(0, 5);
        store.publish(1, 6);
        store.reset(2);
        assert_eq!(store.value(0), Ok(0));
        assert_eq!(store.sequence(1), Ok(0));
        assert_eq!(store.generation(1), Ok(0));
    }

    #[test]
    fn every_reset_starts_a_new_epoch() {
        let store = SampleStore::new();
        let before = store.epoch();
        store.reset(1);
        store.close();
        store.reset(1);
        assert_eq!(store.epoch(), before.wrapping_add(2));
    }

    #[test]
    fn snapshot_is_limited_by_session_and_buffer() {
        let store = SampleStore::new();
        store.reset(3);
        store.publish(0, 1);
        store.publish(1, 2);
        store.publish(2, 3);

        let mut small = [0u16; 2];
        assert_eq!(store.snapshot(&mut small), 2);
        assert_eq!(small, [1, 2]);

        let mut large = [9u16; 5];
        assert_eq!(store.snapshot(&mut large), 3);
        assert_eq!(large, [1, 2, 3, 9, 9]);
    }
}
