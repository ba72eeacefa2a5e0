//! Provides a background, interrupt-driven analog scan engine.
//!
//! A [`ScanAdc`] owns one [`ConversionPeripheral`] and cycles it round-robin through a list of
//! [`ChannelConfig`]s. Every completed conversion advances the scan state machine from the
//! peripheral's completion interrupt, which must call [`ScanAdc::on_conversion_complete()`].
//! Each channel's raw conversions are averaged over a power-of-two window, and the result is
//! published for application code to read without blocking the producer:
//!
//! - [`ScanAdc::get_sample()`] and [`ScanAdc::samples()`] read the latest values,
//! - [`ScanAdc::get_sequence()`] and [`ScanAdc::generation()`] expose per-channel update
//!   counters, which [`ScanAdc::wait_channel()`] and friends poll,
//! - attached [`ChannelCallback`]s and [`ScanCallback`]s run in the producer's context,
//! - [`ScanEvent`]s are queued for the application's context when enabled with
//!   [`ScanAdc::publish_events()`].
//!
//! There is no global instance: the application decides where the [`ScanAdc`] lives, typically in
//! a `static` shared with its interrupt handler.
//!
//! ```ignore
//! static SCAN: ScanAdc<MyAdc> = ScanAdc::new(MyAdc::new());
//!
//! #[interrupt]
//! fn ADC() {
//!     SCAN.on_conversion_complete();
//! }
//!
//! fn main() -> ! {
//!     SCAN.begin(&[ChannelConfig::new(Mux::Adc0, 4), ChannelConfig::unaveraged(Mux::Adc1)])
//!         .unwrap();
//!     loop {
//!         SCAN.wait_scan().unwrap();
//!         let x = SCAN.get_sample(0).unwrap();
//!         // ...
//!     }
//! }
//! ```
//!
//! # Synchronization
//!
//! Reads of values and swaps of callbacks run inside a critical section, which on single-core
//! targets masks the completion interrupt for their duration. Update counters are atomics and are
//! polled without masking; a reader that observes a new counter value also observes the value it
//! belongs to.

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]
#![deny(clippy::pedantic)]

mod channel;
mod config;
mod dispatch;
mod error;
mod peripheral;
mod scan;
mod store;
mod wait;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

use crate::{
    dispatch::Dispatcher,
    scan::Session,
    store::SampleStore,
    wait::Forever,
};

pub use crate::{
    channel::ChannelConfig,
    config::{ACCUMULATOR_BITS, EVENT_QUEUE_DEPTH, MAX_AVERAGING_LOG2, MAX_CHANNELS},
    dispatch::{ChannelCallback, EventKinds, Samples, ScanCallback, ScanEvent},
    error::Error,
    peripheral::ConversionPeripheral,
    scan::Phase,
    wait::{CancelToken, Deadline, SpinBudget},
};

#[cfg(feature = "time")]
pub use crate::wait::Until;

struct Scanner<P: ConversionPeripheral> {
    peripheral: P,
    session: Option<Session<P::Selector>>,
}

impl<P: ConversionPeripheral> Scanner<P> {
    /// Silences the peripheral and drops the session. Returns whether a session was running.
    fn stop(&mut self, store: &SampleStore) -> bool {
        self.peripheral.disable_completion_signal();
        self.peripheral.disarm();
        store.close();
        self.session.take().is_some()
    }
}

/// A round-robin scan over the inputs of one conversion peripheral.
pub struct ScanAdc<P: ConversionPeripheral> {
    state: Mutex<CriticalSectionRawMutex, RefCell<Scanner<P>>>,
    store: SampleStore,
    dispatcher: Dispatcher,
}

impl<P: ConversionPeripheral> ScanAdc<P> {
    /// Creates an idle scanner owning `peripheral`.
    #[must_use]
    pub const fn new(peripheral: P) -> Self {
        Self {
            state: Mutex::new(RefCell::new(Scanner {
                peripheral,
                session: None,
            })),
            store: SampleStore::new(),
            dispatcher: Dispatcher::new(),
        }
    }

    /// Starts scanning `configs`, stopping any running session first.
    ///
    /// The configuration is copied; the caller's buffer may be reused right away. Every channel's
    /// value and update counters are reset to 0, the scan restarts from channel 0, and the
    /// peripheral is armed so that the very next completion signal starts producing.
    ///
    /// # Errors
    ///
    /// - [`Error::NoChannels`] or [`Error::TooManyChannels`] if `configs` is empty or longer than
    ///   [`MAX_CHANNELS`],
    /// - [`Error::AveragingOutOfRange`] if a window exceeds 2^[`MAX_AVERAGING_LOG2`],
    /// - [`Error::Busy`] if called from inside [`Self::with_peripheral()`].
    ///
    /// A rejected configuration leaves the running session, if any, untouched.
    pub fn begin(&self, configs: &[ChannelConfig<P::Selector>]) -> Result<(), Error> {
        // Together with MAX_AVERAGING_LOG2, bounds the accumulator to ACCUMULATOR_BITS.
        const { assert!(P::RESOLUTION_BITS <= u16::BITS) };

        let channels = channel::copy_table(configs).inspect_err(|err| {
            scanadc_log::warn!(
                "scan configuration rejected: {}",
                scanadc_log::display(err)
            );
        })?;
        let channel_count = channels.len();

        self.state.lock(|state| {
            let mut scanner = state.try_borrow_mut().map_err(|_| Error::Busy)?;
            scanner.stop(&self.store);

            self.store.reset(channel_count);
            self.dispatcher.reset();

            let session = Session::new(channels);
            let Scanner {
                peripheral,
                session: slot,
            } = &mut *scanner;
            if let Some(input) = session.first_input() {
                peripheral.select_input(input);
            }
            *slot = Some(session);
            peripheral.arm_continuous_trigger();
            peripheral.enable_completion_signal();
            Ok::<_, Error>(())
        })?;

        scanadc_log::info!("scan started on {} channels", channel_count);
        Ok(())
    }

    /// Stops scanning.
    ///
    /// Disables the completion signal and continuous conversions, and drops the session. Does
    /// nothing when no session is running.
    ///
    /// # Errors
    ///
    /// [`Error::Busy`] if called from inside [`Self::with_peripheral()`].
    pub fn end(&self) -> Result<(), Error> {
        let was_running = self.state.lock(|state| {
            let mut scanner = state.try_borrow_mut().map_err(|_| Error::Busy)?;
            Ok::<_, Error>(scanner.stop(&self.store))
        })?;

        if was_running {
            scanadc_log::info!("scan stopped");
        }
        Ok(())
    }

    /// Advances the scan by one completed conversion.
    ///
    /// This is the producer: bind it to the peripheral's completion interrupt. Publishes a value,
    /// then runs callbacks and queues events, whenever a channel's averaging window fills up.
    /// Does nothing when no session is running.
    pub fn on_conversion_complete(&self) {
        let completion = self.state.lock(|state| {
            let Ok(mut scanner) = state.try_borrow_mut() else {
                scanadc_log::warn!("conversion completed while the scan state was borrowed");
                return None;
            };
            let Scanner {
                peripheral,
                session,
            } = &mut *scanner;

            let completion = session.as_mut()?.tick(peripheral)?;
            self.store.publish(completion.channel, completion.value);
            Some(completion)
        });
        let Some(completion) = completion else {
            return;
        };

        // Dispatch after releasing the session, so callbacks cannot observe it mid-update.
        let epoch = self.store.epoch();
        scanadc_log::trace!(
            "channel {} published {}",
            completion.channel,
            completion.value
        );
        self.dispatcher.dispatch(completion, &self.store);

        // A callback may have restarted the scan; the new session starts on channel 0 already.
        if self.store.epoch() == epoch {
            self.state.lock(|state| {
                if let Ok(mut scanner) = state.try_borrow_mut() {
                    if let Some(session) = scanner.session.as_mut() {
                        session.advance();
                    }
                }
            });
        }
    }

    /// Replaces the per-channel callback; `None` detaches it.
    pub fn attach_channel_callback(&self, callback: Option<ChannelCallback>) {
        self.dispatcher.set_channel_callback(callback);
    }

    /// Replaces the per-scan callback; `None` detaches it.
    pub fn attach_scan_callback(&self, callback: Option<ScanCallback>) {
        self.dispatcher.set_scan_callback(callback);
    }

    /// Chooses which [`ScanEvent`]s the producer queues. None are queued by default.
    pub fn publish_events(&self, kinds: EventKinds) {
        self.dispatcher.set_kinds(kinds);
    }

    /// Returns which [`ScanEvent`]s the producer queues.
    #[must_use]
    pub fn published_events(&self) -> EventKinds {
        self.dispatcher.kinds()
    }

    /// Returns the oldest queued [`ScanEvent`], if any.
    #[must_use]
    pub fn try_next_event(&self) -> Option<ScanEvent> {
        self.dispatcher.try_receive()
    }

    /// Waits for the next queued [`ScanEvent`].
    pub async fn next_event(&self) -> ScanEvent {
        self.dispatcher.receive().await
    }

    /// Returns how many events were dropped because the queue was full, since the last
    /// [`Self::begin()`].
    #[must_use]
    pub fn dropped_events(&self) -> u32 {
        self.dispatcher.dropped()
    }

    /// Returns whether a session is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.store.channel_count() > 0
    }

    /// Returns the number of channels in the running session, 0 when idle.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.store.channel_count()
    }

    /// Returns the channel the scan is on and its phase, or `None` when idle.
    ///
    /// From inside a callback, this is the channel that just published, still in
    /// [`Phase::Accumulate`].
    ///
    /// # Errors
    ///
    /// [`Error::Busy`] if called from inside [`Self::with_peripheral()`].
    pub fn position(&self) -> Result<Option<(usize, Phase)>, Error> {
        self.state.lock(|state| {
            let scanner = state.try_borrow().map_err(|_| Error::Busy)?;
            Ok(scanner.session.as_ref().map(Session::position))
        })
    }

    /// Returns the latest value published for `channel`.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelOutOfRange`] or [`Error::NotRunning`].
    pub fn get_sample(&self, channel: usize) -> Result<u16, Error> {
        self.store.value(channel)
    }

    /// Copies the latest value of every channel into `out`, all taken at the same instant.
    ///
    /// Returns the number of values copied: the smaller of `out.len()` and
    /// [`Self::channel_count()`].
    pub fn samples(&self, out: &mut [u16]) -> usize {
        self.store.snapshot(out)
    }

    /// Returns the 8-bit cyclic update counter of `channel`.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelOutOfRange`] or [`Error::NotRunning`].
    pub fn get_sequence(&self, channel: usize) -> Result<u8, Error> {
        self.store.sequence(channel)
    }

    /// Returns the 32-bit update counter of `channel`.
    ///
    /// Counts the same updates as [`Self::get_sequence()`], but takes 2^32 updates to wrap, so
    /// slow pollers do not miss changes.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelOutOfRange`] or [`Error::NotRunning`].
    pub fn generation(&self, channel: usize) -> Result<u32, Error> {
        self.store.generation(channel)
    }

    /// Spins until `channel` publishes its next value.
    ///
    /// This never yields and has no timeout; it is meant for bare-metal code without a scheduler.
    /// Prefer [`Self::wait_channel_until()`] or [`Self::next_event()`] where possible.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelOutOfRange`], or [`Error::NotRunning`] also if the session is stopped or
    /// restarted while waiting.
    pub fn wait_channel(&self, channel: usize) -> Result<(), Error> {
        self.wait_channel_until(channel, Forever)
    }

    /// Spins until `channel` publishes its next value, or `deadline` expires.
    ///
    /// # Errors
    ///
    /// Those of [`Self::wait_channel()`], and [`Error::TimedOut`].
    pub fn wait_channel_until(
        &self,
        channel: usize,
        mut deadline: impl Deadline,
    ) -> Result<(), Error> {
        self.store.check(channel)?;
        let epoch = self.store.epoch();
        let start = self.store.raw_generation(channel);

        loop {
            if self.store.raw_generation(channel) != start {
                return if self.store.epoch() == epoch {
                    Ok(())
                } else {
                    Err(Error::NotRunning)
                };
            }
            if self.store.epoch() != epoch || self.store.channel_count() <= channel {
                return Err(Error::NotRunning);
            }
            if deadline.expired() {
                return Err(Error::TimedOut);
            }
            core::hint::spin_loop();
        }
    }

    /// Spins until the last configured channel publishes, i.e. until the next scan completes.
    ///
    /// See [`Self::wait_channel()`] for caveats.
    ///
    /// # Errors
    ///
    /// [`Error::NotRunning`].
    pub fn wait_scan(&self) -> Result<(), Error> {
        self.wait_scan_until(Forever)
    }

    /// Spins until the next scan completes, or `deadline` expires.
    ///
    /// # Errors
    ///
    /// [`Error::NotRunning`] or [`Error::TimedOut`].
    pub fn wait_scan_until(&self, deadline: impl Deadline) -> Result<(), Error> {
        let last = self
            .store
            .channel_count()
            .checked_sub(1)
            .ok_or(Error::NotRunning)?;
        self.wait_channel_until(last, deadline)
    }

    /// Runs `f` with exclusive access to the peripheral.
    ///
    /// `f` runs inside a critical section, so the producer cannot run concurrently; keep it short.
    ///
    /// # Errors
    ///
    /// [`Error::Busy`] if called re-entrantly.
    pub fn with_peripheral<R>(&self, f: impl FnOnce(&mut P) -> R) -> Result<R, Error> {
        self.state.lock(|state| {
            let mut scanner = state.try_borrow_mut().map_err(|_| Error::Busy)?;
            Ok(f(&mut scanner.peripheral))
        })
    }
}
