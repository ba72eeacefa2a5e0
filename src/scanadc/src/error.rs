//! Errors of the control API.

/// Errors returned by the scan engine's control API.
// NOTE(eq): every variant carries plain integers, so deriving `Eq` is fine here.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// [`begin()`](crate::ScanAdc::begin) was given an empty channel list.
    NoChannels,
    /// [`begin()`](crate::ScanAdc::begin) was given more than
    /// [`MAX_CHANNELS`](crate::MAX_CHANNELS) channels.
    TooManyChannels {
        /// Number of channels requested.
        requested: usize,
    },
    /// A channel asked for an averaging window wider than
    /// [`MAX_AVERAGING_LOG2`](crate::MAX_AVERAGING_LOG2) allows.
    AveragingOutOfRange {
        /// Index of the offending channel in the configuration list.
        channel: usize,
        /// Requested log2 of the window size.
        averaging_log2: u8,
    },
    /// The channel index is not part of the running scan session.
    ChannelOutOfRange {
        /// Requested channel index.
        channel: usize,
        /// Number of channels in the session.
        channel_count: usize,
    },
    /// No scan session is running.
    NotRunning,
    /// The session state is already borrowed by the caller's own context, e.g. a lifecycle call
    /// from inside [`with_peripheral()`](crate::ScanAdc::with_peripheral).
    Busy,
    /// The deadline passed to a bounded wait expired before an update arrived.
    TimedOut,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoChannels => write!(f, "no channels configured"),
            Self::TooManyChannels { requested } => write!(
                f,
                "{requested} channels requested, at most {} supported",
                crate::MAX_CHANNELS
            ),
            Self::AveragingOutOfRange {
                channel,
                averaging_log2,
            } => write!(
                f,
                "channel {channel}: averaging window 2^{averaging_log2} exceeds 2^{}",
                crate::MAX_AVERAGING_LOG2
            ),
            Self::ChannelOutOfRange {
                channel,
                channel_count,
            } => write!(
                f,
                "channel {channel} out of range for {channel_count} configured channels"
            ),
            Self::NotRunning => write!(f, "no scan session running"),
            Self::Busy => write!(f, "scan state borrowed re-entrantly"),
            Self::TimedOut => write!(f, "deadline expired before the next update"),
        }
    }
}

impl core::error::Error for Error {}
