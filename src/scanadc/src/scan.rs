//! The scan state machine, advanced once per completed conversion.

use crate::{channel::ChannelTable, peripheral::ConversionPeripheral};

/// Phase of the state machine for the current channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Selects the channel's input and prepares the accumulator.
    Init,
    /// Discards the conversion that was already in flight when the input changed.
    Settle,
    /// Sums raw results until the averaging window is full.
    Accumulate,
}

/// A value produced when a channel's averaging window fills up.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Completion {
    pub channel: usize,
    pub value: u16,
    /// Whether this was the last configured channel, i.e. a full scan just finished.
    pub wrapped: bool,
}

/// State of a running scan session.
pub(crate) struct Session<S> {
    channels: ChannelTable<S>,
    index: usize,
    phase: Phase,
    accumulator: u32,
    count: u32,
    target: u32,
    /// Set once the current channel has published, until [`Self::advance()`] moves on.
    published: bool,
}

impl<S: Copy> Session<S> {
    /// Creates a session positioned on channel 0, waiting for its first tick.
    ///
    /// `channels` must not be empty.
    pub fn new(channels: ChannelTable<S>) -> Self {
        Self {
            channels,
            index: 0,
            phase: Phase::Init,
            accumulator: 0,
            count: 0,
            target: 1,
            published: false,
        }
    }

    pub fn first_input(&self) -> Option<S> {
        self.channels.first().map(|config| config.input)
    }

    pub fn position(&self) -> (usize, Phase) {
        (self.index, self.phase)
    }

    /// Moves on to the next channel after the current one has published. Does nothing otherwise.
    pub fn advance(&mut self) {
        if !self.published {
            return;
        }
        self.published = false;
        self.index += 1;
        if self.index == self.channels.len() {
            self.index = 0;
        }
        self.phase = Phase::Init;
    }

    /// Advances the state machine by one completed conversion.
    ///
    /// A returned [`Completion`] leaves the session on its channel until [`Self::advance()`], so
    /// that callbacks see the channel that published. The next tick advances if nobody did.
    pub fn tick<P>(&mut self, peripheral: &mut P) -> Option<Completion>
    where
        P: ConversionPeripheral<Selector = S>,
    {
        self.advance();

        // The index is kept in range by `advance()`, so this only fails for an empty table.
        let config = *self.channels.get(self.index)?;

        match self.phase {
            Phase::Init => {
                peripheral.select_input(config.input);
                self.accumulator = 0;
                self.count = 0;
                self.target = config.averaging_window();
                self.phase = Phase::Settle;
                None
            }
            Phase::Settle => {
                self.phase = Phase::Accumulate;
                None
            }
            Phase::Accumulate => {
                self.accumulator += u32::from(peripheral.read_result());
                self.count += 1;

                if self.count < self.target {
                    return None;
                }

                self.published = true;
                Some(Completion {
                    channel: self.index,
                    value: average(self.accumulator, config.averaging_log2),
                    wrapped: self.index + 1 == self.channels.len(),
                })
            }
        }
    }
}

/// Divides `accumulator` by `2^log2`, rounding to nearest.
fn average(accumulator: u32, log2: u8) -> u16 {
    let value = if log2 == 0 {
        accumulator
    } else {
        let half = 1u32 << (log2 - 1);
        (accumulator + half) >> log2
    };
    u16::try_from(value).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{channel::copy_table, sim::SimulatedPeripheral, ChannelConfig};

    fn session(configs: &[ChannelConfig<u8>]) -> Session<u8> {
        Session::new(copy_table(configs).unwrap())
    }

    fn run(
        session: &mut Session<u8>,
        adc: &mut SimulatedPeripheral,
        ticks: usize,
    ) -> std::vec::Vec<Completion> {
        (0..ticks).filter_map(|_| session.tick(adc)).collect()
    }

    #[test]
    fn rounds_to_nearest() {
        assert_eq!(average(404, 2), 101);
        assert_eq!(average(402, 2), 101); // 100.5
        assert_eq!(average(401, 2), 100); // 100.25
        assert_eq!(average(7, 0), 7);
        assert_eq!(average(u32::from(u16::MAX) << 15, 15), u16::MAX);
    }

    #[test]
    fn unaveraged_channel_completes_on_third_tick() {
        let mut adc = SimulatedPeripheral::new();
        adc.set_level(3, 700);
        let mut s = session(&[ChannelConfig::unaveraged(3)]);

        assert_eq!(s.tick(&mut adc), None);
        assert_eq!(s.position(), (0, Phase::Settle));
        assert_eq!(adc.selected(), Some(3));
        assert_eq!(s.tick(&mut adc), None);
        assert_eq!(s.position(), (0, Phase::Accumulate));
        assert_eq!(
            s.tick(&mut adc),
            Some(Completion {
                channel: 0,
                value: 700,
                wrapped: true
            })
        );
        assert_eq!(s.position(), (0, Phase::Accumulate));
        s.advance();
        assert_eq!(s.position(), (0, Phase::Init));
    }

    #[test]
    fn advance_only_after_publishing() {
        let mut adc = SimulatedPeripheral::new();
        let mut s = session(&[ChannelConfig::unaveraged(0), ChannelConfig::unaveraged(1)]);

        s.advance();
        assert_eq!(s.position(), (0, Phase::Init));
        run(&mut s, &mut adc, 2);
        s.advance();
        assert_eq!(s.position(), (0, Phase::Accumulate));

        run(&mut s, &mut adc, 1);
        s.advance();
        s.advance();
        assert_eq!(s.position(), (1, Phase::Init));
    }

    #[test]
    fn settle_tick_does_not_read() {
        let mut adc = SimulatedPeripheral::new();
        adc.push_samples(1, &[10, 20]);
        let mut s = session(&[ChannelConfig::unaveraged(1)]);

        let completions = run(&mut s, &mut adc, 3);
        assert_eq!(completions.first().map(|c| c.value), Some(10));
        assert_eq!(adc.conversions_read(), 1);
    }

    #[test]
    fn stays_on_channel_while_accumulating() {
        let mut adc = SimulatedPeripheral::new();
        adc.push_samples(5, &[100, 102, 98, 104]);
        let mut s = session(&[ChannelConfig::new(5, 2), ChannelConfig::unaveraged(6)]);

        // Init + Settle + three accumulate ticks: still on channel 0.
        assert!(run(&mut s, &mut adc, 5).is_empty());
        assert_eq!(s.position(), (0, Phase::Accumulate));
        assert_eq!(adc.selections(), 1);

        let completions = run(&mut s, &mut adc, 1);
        assert_eq!(
            completions.as_slice(),
            &[Completion {
                channel: 0,
                value: 101,
                wrapped: false
            }]
        );
        assert_eq!(s.position(), (0, Phase::Accumulate));
        s.advance();
        assert_eq!(s.position(), (1, Phase::Init));
    }

    #[test]
    fn identical_samples_average_to_themselves() {
        for log2 in 0..=8u8 {
            let mut adc = SimulatedPeripheral::new();
            adc.set_level(0, 1023);
            let mut s = session(&[ChannelConfig::new(0, log2)]);
            let ticks = 2 + (1usize << log2);

            let completions = run(&mut s, &mut adc, ticks);
            assert_eq!(completions.len(), 1, "log2 = {log2}");
            assert_eq!(completions.first().map(|c| c.value), Some(1023));
        }
    }

    #[test]
    fn wraps_after_last_channel() {
        let mut adc = SimulatedPeripheral::new();
        let mut s = session(&[
            ChannelConfig::unaveraged(0),
            ChannelConfig::unaveraged(1),
            ChannelConfig::unaveraged(2),
        ]);

        let completions = run(&mut s, &mut adc, 3 * 3 * 2);
        let channels: std::vec::Vec<_> = completions.iter().map(|c| c.channel).collect();
        let wraps: std::vec::Vec<_> = completions.iter().map(|c| c.wrapped).collect();
        assert_eq!(channels, [0, 1, 2, 0, 1, 2]);
        assert_eq!(wraps, [false, false, true, false, false, true]);
    }
}
