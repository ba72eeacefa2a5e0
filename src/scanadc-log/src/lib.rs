//! Provides logging facilities for the scan engine.
//!
//! Messages are forwarded to [`defmt`](https://docs.rs/defmt) when the `defmt` feature is
//! enabled, otherwise to the [`log`](https://docs.rs/log) crate when the `log` feature is enabled.
//! Without either feature the macros compile to nothing, but still evaluate their arguments so
//! that callers do not trip over unused-variable lints.
//!
//! Format strings must stick to the `{}` placeholder, which both backends understand.

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]
#![deny(clippy::pedantic)]

// Hidden re-exports so the exported macros can name the backend from the caller's crate.
#[doc(hidden)]
pub mod __private {
    #[cfg(feature = "defmt")]
    pub use defmt;

    #[cfg(all(feature = "log", not(feature = "defmt")))]
    pub use log;
}

/// Returns the name of the backend log messages are routed to.
#[must_use]
pub const fn backend() -> &'static str {
    if cfg!(feature = "defmt") {
        "defmt"
    } else if cfg!(feature = "log") {
        "log"
    } else {
        "none"
    }
}

/// Wraps a [`Display`](core::fmt::Display) value so that every backend can format it with `{}`.
#[cfg(feature = "defmt")]
#[must_use]
pub fn display<T: core::fmt::Display>(value: &T) -> defmt::Display2Format<'_, T> {
    defmt::Display2Format(value)
}

/// Wraps a [`Display`](core::fmt::Display) value so that every backend can format it with `{}`.
#[cfg(not(feature = "defmt"))]
#[must_use]
pub fn display<T: core::fmt::Display>(value: &T) -> &T {
    value
}

// The backend is chosen here, in this crate, because a `cfg` inside an exported macro body would
// be evaluated against the features of the calling crate.

#[cfg(feature = "defmt")]
#[doc(hidden)]
#[macro_export]
macro_rules! __emit {
    ($level:ident, $($arg:tt)*) => {{
        use $crate::__private::defmt;
        defmt::$level!($($arg)*);
    }};
}

#[cfg(all(feature = "log", not(feature = "defmt")))]
#[doc(hidden)]
#[macro_export]
macro_rules! __emit {
    ($level:ident, $($arg:tt)*) => {{
        $crate::__private::log::$level!($($arg)*);
    }};
}

#[cfg(not(any(feature = "defmt", feature = "log")))]
#[doc(hidden)]
#[macro_export]
macro_rules! __emit {
    ($level:ident, $($arg:tt)*) => {{
        let _ = ($($arg)*);
    }};
}

/// Logs a message at the trace level.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::__emit!(trace, $($arg)*)
    };
}

/// Logs a message at the debug level.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::__emit!(debug, $($arg)*)
    };
}

/// Logs a message at the info level.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::__emit!(info, $($arg)*)
    };
}

/// Logs a message at the warn level.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::__emit!(warn, $($arg)*)
    };
}

/// Logs a message at the error level.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::__emit!(error, $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn macros_accept_format_arguments() {
        let channel = 3usize;
        let value = 512u16;
        crate::trace!("channel {} published {}", channel, value);
        crate::debug!("channel {}", channel);
        crate::info!("scan started");
        crate::warn!("dropped {} events", 2u32);
        crate::error!("value {}", value);
    }

    #[test]
    fn display_only_types_can_be_logged() {
        struct Reason;

        impl core::fmt::Display for Reason {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str("no channels")
            }
        }

        crate::warn!("configuration rejected: {}", crate::display(&Reason));
    }

    #[test]
    fn backend_matches_features() {
        let expected = if cfg!(feature = "defmt") {
            "defmt"
        } else if cfg!(feature = "log") {
            "log"
        } else {
            "none"
        };
        assert_eq!(super::backend(), expected);
    }
}
