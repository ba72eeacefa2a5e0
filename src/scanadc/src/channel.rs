//! Per-channel acquisition parameters.

use heapless::Vec;

use crate::{Error, MAX_AVERAGING_LOG2, MAX_CHANNELS};

/// Acquisition parameters of one scanned channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelConfig<S> {
    /// Peripheral input sampled for this channel.
    pub input: S,
    /// Log2 of the number of raw conversions averaged into one published value.
    ///
    /// `0` publishes every conversion as is.
    pub averaging_log2: u8,
}

impl<S> ChannelConfig<S> {
    /// Creates a channel configuration.
    #[must_use]
    pub const fn new(input: S, averaging_log2: u8) -> Self {
        Self {
            input,
            averaging_log2,
        }
    }

    /// Creates a channel configuration publishing every raw conversion.
    #[must_use]
    pub const fn unaveraged(input: S) -> Self {
        Self::new(input, 0)
    }

    /// Returns the number of raw conversions averaged per published value.
    ///
    /// Saturates for out-of-range [`Self::averaging_log2`] values, which
    /// [`ScanAdc::begin()`](crate::ScanAdc::begin) rejects anyway.
    #[must_use]
    pub fn averaging_window(&self) -> u32 {
        1u32.checked_shl(u32::from(self.averaging_log2)).unwrap_or(u32::MAX)
    }
}

/// Session-owned copy of the channel list.
pub(crate) type ChannelTable<S> = Vec<ChannelConfig<S>, MAX_CHANNELS>;

/// Validates `configs` and copies them into session-owned storage.
pub(crate) fn copy_table<S: Copy>(configs: &[ChannelConfig<S>]) -> Result<ChannelTable<S>, Error> {
    if configs.is_empty() {
        return Err(Error::NoChannels);
    }

    if let Some((channel, config)) = configs
        .iter()
        .enumerate()
        .find(|(_, config)| config.averaging_log2 > MAX_AVERAGING_LOG2)
    {
        return Err(Error::AveragingOutOfRange {
            channel,
            averaging_log2: config.averaging_log2,
        });
    }

    Vec::from_slice(configs).map_err(|()| Error::TooManyChannels {
        requested: configs.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averaging_window() {
        assert_eq!(ChannelConfig::unaveraged(0u8).averaging_window(), 1);
        assert_eq!(ChannelConfig::new(0u8, 2).averaging_window(), 4);
        assert_eq!(ChannelConfig::new(0u8, 15).averaging_window(), 32768);
        assert_eq!(ChannelConfig::new(0u8, 40).averaging_window(), u32::MAX);
    }

    #[test]
    fn copy_rejects_empty() {
        assert_eq!(copy_table::<u8>(&[]), Err(Error::NoChannels));
    }

    #[test]
    fn copy_rejects_too_many() {
        let configs = [ChannelConfig::unaveraged(0u8); MAX_CHANNELS + 1];
        assert_eq!(
            copy_table(&configs),
            Err(Error::TooManyChannels { requested: 17 })
        );
    }

    #[test]
    fn copy_rejects_wide_window() {
        let configs = [
            ChannelConfig::new(4u8, 3),
            ChannelConfig::new(5u8, MAX_AVERAGING_LOG2 + 1),
        ];
        assert_eq!(
            copy_table(&configs),
            Err(Error::AveragingOutOfRange {
                channel: 1,
                averaging_log2: 16
            })
        );
    }

    #[test]
    fn copy_is_independent_of_caller_buffer() {
        let mut configs = [ChannelConfig::new(1u8, 0), ChannelConfig::new(2u8, 4)];
        let table = copy_table(&configs).unwrap();
        if let Some(first) = configs.first_mut() {
            first.input = 9;
        }
        assert_eq!(
            table.as_slice(),
            &[ChannelConfig::new(1u8, 0), ChannelConfig::new(2u8, 4)]
        );
    }

    #[test]
    fn copy_accepts_full_table() {
        let configs = [ChannelConfig::new(7u8, MAX_AVERAGING_LOG2); MAX_CHANNELS];
        assert_eq!(copy_table(&configs).unwrap().len(), MAX_CHANNELS);
    }
}
