//! Hands published values to application code: attached callbacks, and a bounded event queue.
//!
//! Callbacks run synchronously in the producer's context. The event queue is the alternative for
//! work that must not run there: the producer pushes [`ScanEvent`]s without ever blocking, and
//! the application drains them from its own context.

use core::cell::Cell;

use embassy_sync::{
    blocking_mutex::{raw::CriticalSectionRawMutex, Mutex},
    channel::Channel,
};
use portable_atomic::{AtomicU32, AtomicU8, Ordering};

use crate::{scan::Completion, store::SampleStore, EVENT_QUEUE_DEPTH, MAX_CHANNELS};

/// Called with the channel index and its new value each time a channel publishes.
///
/// Runs in the producer's context, so it must not block.
pub type ChannelCallback = fn(usize, u16);

/// Called with every channel's current value each time a full scan completes.
///
/// Runs in the producer's context, so it must not block.
pub type ScanCallback = fn(&[u16]);

/// Selects which [`ScanEvent`]s the producer pushes to the event queue.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventKinds(u8);

impl EventKinds {
    /// No events; the default.
    pub const NONE: Self = Self(0);
    /// [`ScanEvent::ChannelUpdated`] after each published value.
    pub const CHANNEL: Self = Self(1 << 0);
    /// [`ScanEvent::ScanCompleted`] after each full scan.
    pub const SCAN: Self = Self(1 << 1);
    /// Both kinds.
    pub const ALL: Self = Self(Self::CHANNEL.0 | Self::SCAN.0);

    /// Returns whether every kind in `other` is also in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for EventKinds {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Current values of every configured channel, captured at the end of a scan.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Samples {
    values: [u16; MAX_CHANNELS],
    len: usize,
}

impl Samples {
    fn capture(store: &SampleStore) -> Self {
        let mut values = [0; MAX_CHANNELS];
        let len = store.snapshot(&mut values);
        Self { values, len }
    }

    /// Returns the values, indexed by channel.
    #[must_use]
    pub fn as_slice(&self) -> &[u16] {
        self.values.get(..self.len).unwrap_or(&[])
    }
}

impl core::ops::Deref for Samples {
    type Target = [u16];

    fn deref(&self) -> &[u16] {
        self.as_slice()
    }
}

/// An update pushed by the producer to the event queue.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanEvent {
    /// A channel published a new value.
    ChannelUpdated {
        /// Channel index.
        channel: usize,
        /// Published value.
        value: u16,
        /// The channel's update counter after this value, see
        /// [`ScanAdc::generation()`](crate::ScanAdc::generation).
        generation: u32,
    },
    /// The last configured channel published, completing a scan.
    ScanCompleted(Samples),
}

#[derive(Default, Copy, Clone)]
struct Hooks {
    channel: Option<ChannelCallback>,
    scan: Option<ScanCallback>,
}

pub(crate) struct Dispatcher {
    hooks: Mutex<CriticalSectionRawMutex, Cell<Hooks>>,
    kinds: AtomicU8,
    events: Channel<CriticalSectionRawMutex, ScanEvent, EVENT_QUEUE_DEPTH>,
    dropped: AtomicU32,
}

impl Dispatcher {
    pub const fn new() -> Self {
        Self {
            hooks: Mutex::new(Cell::new(Hooks {
                channel: None,
                scan: None,
            })),
            kinds: AtomicU8::new(EventKinds::NONE.0),
            events: Channel::new(),
            dropped: AtomicU32::new(0),
        }
    }

    pub fn set_channel_callback(&self, callback: Option<ChannelCallback>) {
        self.hooks.lock(|hooks| {
            hooks.set(Hooks {
                channel: callback,
                ..hooks.get()
            });
        });
    }

    pub fn set_scan_callback(&self, callback: Option<ScanCallback>) {
        self.hooks.lock(|hooks| {
            hooks.set(Hooks {
                scan: callback,
                ..hooks.get()
            });
        });
    }

    pub fn set_kinds(&self, kinds: EventKinds) {
        self.kinds.store(kinds.0, Ordering::Relaxed);
    }

    pub fn kinds(&self) -> EventKinds {
        EventKinds(self.kinds.load(Ordering::Relaxed))
    }

    /// Empties the event queue and clears the overrun counter.
    pub fn reset(&self) {
        while self.events.try_receive().is_ok() {}
        self.dropped.store(0, Ordering::Relaxed);
    }

    pub fn try_receive(&self) -> Option<ScanEvent> {
        self.events.try_receive().ok()
    }

    pub async fn receive(&self) -> ScanEvent {
        self.events.receive().await
    }

    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Hands a freshly published value to callbacks and the event queue. Producer only.
    ///
    /// The per-channel callback always runs before the per-scan callback of the same scan.
    pub fn dispatch(&self, completion: Completion, store: &SampleStore) {
        let Completion {
            channel,
            value,
            wrapped,
        } = completion;
        let hooks = self.hooks.lock(Cell::get);
        let kinds = self.kinds();

        if let Some(callback) = hooks.channel {
            callback(channel, value);
        }

        if kinds.contains(EventKinds::CHANNEL) {
            self.push(ScanEvent::ChannelUpdated {
                channel,
                value,
                generation: store.raw_generation(channel),
            });
        }

        if !wrapped || (hooks.scan.is_none() && !kinds.contains(EventKinds::SCAN)) {
            return;
        }

        let samples = Samples::capture(store);

        if let Some(callback) = hooks.scan {
            callback(samples.as_slice());
        }

        if kinds.contains(EventKinds::SCAN) {
            self.push(ScanEvent::ScanCompleted(samples));
        }
    }

    fn push(&self, event: ScanEvent) {
        if self.events.try_send(event).is_err() {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            scanadc_log::warn!("event queue full, {} events dropped", dropped);
        }
    }
}
