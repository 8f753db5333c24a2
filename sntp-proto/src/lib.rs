//! Protocol core of a simple network time protocol client.
//!
//! This crate does no IO of its own. The network and the local millisecond
//! counter are reached through the [`NtpTransport`] and [`LocalClock`]
//! traits, so the same client runs on a hosted system or against a scripted
//! transport in tests.

#![forbid(unsafe_code)]

mod client;
mod clock;
mod config;
mod identifiers;
mod io;
mod packet;
mod sync;
#[cfg(test)]
mod test_support;
mod time_types;

pub use client::NtpClient;
pub use clock::LocalClock;
pub use config::{
    ClientConfig, DEFAULT_LOCAL_PORT, DEFAULT_RESPONSE_TIMEOUT, DEFAULT_SERVER,
    DEFAULT_UPDATE_INTERVAL, NTP_PORT,
};
pub use identifiers::ReferenceId;
pub use io::NtpTransport;
pub use packet::{
    ExchangeTimestamps, NtpAssociationMode, NtpHeader, NtpLeapIndicator, PacketParsingError,
};
pub use sync::{clock_offset, round_trip_delay, synchronize, Anchor, SyncError};
pub use time_types::{LocalTime, MillisInstant, NtpDuration, NtpTimestamp, EPOCH_OFFSET};
