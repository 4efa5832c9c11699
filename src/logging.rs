//! Unified logging macro for the protocol engine.
//!
//! The engine logs through [`knx_log!`](crate::knx_log), which forwards to the
//! `log` facade by default and to `defmt` when the `defmt` feature is enabled.
//! Applications install whatever `log` backend they like (`env_logger`,
//! `simple_logger`, a tracing bridge...).
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::knx_log;
//!
//! knx_log!(info, "Connected on channel {}", channel_id);
//! knx_log!(debug, "Heartbeat attempt {}/{}", attempt, max);
//! knx_log!(warn, "Dropping malformed frame ({} bytes)", len);
//! knx_log!(trace, "rx {:02x?}", bytes);
//! ```
//!
//! # Feature Flags
//!
//! - `defmt` - Uses `defmt::` (compact binary logging)
//! - No feature - Uses `log::`

/// Unified logging macro - selects `log::` or `defmt::` based on features
///
/// # Examples
///
/// ```rust,ignore
/// knx_log!(info, "Discovery finished, {} servers", count);
/// knx_log!(error, "Forcing disconnect: {}", reason);
/// ```
#[macro_export]
#[cfg(not(feature = "defmt"))]
macro_rules! knx_log {
    (info, $($arg:tt)*) => { log::info!(target: "knx_netip", $($arg)*) };
    (debug, $($arg:tt)*) => { log::debug!(target: "knx_netip", $($arg)*) };
    (warn, $($arg:tt)*) => { log::warn!(target: "knx_netip", $($arg)*) };
    (error, $($arg:tt)*) => { log::error!(target: "knx_netip", $($arg)*) };
    (trace, $($arg:tt)*) => { log::trace!(target: "knx_netip", $($arg)*) };
}

#[macro_export]
#[cfg(feature = "defmt")]
macro_rules! knx_log {
    (info, $($arg:tt)*) => { defmt::info!($($arg)*) };
    (debug, $($arg:tt)*) => { defmt::debug!($($arg)*) };
    (warn, $($arg:tt)*) => { defmt::warn!($($arg)*) };
    (error, $($arg:tt)*) => { defmt::error!($($arg)*) };
    (trace, $($arg:tt)*) => { defmt::trace!($($arg)*) };
}
