//! Compile-time limits and build-environment configuration.

/// Maximum number of channels a scan session can hold.
pub const MAX_CHANNELS: usize = 16;

/// Largest accepted [`ChannelConfig::averaging_log2`](crate::ChannelConfig::averaging_log2).
pub const MAX_AVERAGING_LOG2: u8 = 15;

/// Width of the averaging accumulator, in bits.
pub const ACCUMULATOR_BITS: u32 = u32::BITS;

// Reads an integer from the build environment, falling back to a default.
// Fails the build, rather than silently using the default, when the variable does not parse.
macro_rules! usize_from_env_or {
    ($env_var:literal, $default:expr) => {
        match option_env!($env_var) {
            Some(str_value) => match konst::primitive::parse_usize(str_value) {
                Ok(value) => value,
                Err(_) => const_panic::concat_panic!(
                    "could not parse environment variable `",
                    $env_var,
                    "=",
                    str_value,
                    "` as a usize",
                ),
            },
            None => $default,
        }
    };
}

/// Depth of the producer-to-consumer event queue.
///
/// Set with the `SCANADC_EVENT_QUEUE_DEPTH` environment variable at build time.
pub const EVENT_QUEUE_DEPTH: usize = {
    let depth = usize_from_env_or!("SCANADC_EVENT_QUEUE_DEPTH", 8);
    assert!(depth > 0, "SCANADC_EVENT_QUEUE_DEPTH must not be zero");
    depth
};
