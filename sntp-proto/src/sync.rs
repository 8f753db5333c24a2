//! One request/response round trip with the time server.
//!
//! The engine is stateless: it gets the current anchor, and on success
//! hands back the anchor that should replace it. Whoever owns the anchor
//! decides what to do with failures.

use std::fmt;

use tracing::{debug, trace, warn};

use crate::{
    clock::LocalClock,
    config::ClientConfig,
    identifiers::ReferenceId,
    io::NtpTransport,
    packet::{NtpHeader, PacketParsingError},
    time_types::{MillisInstant, NtpDuration, NtpTimestamp, EPOCH_OFFSET},
};

/// Largest datagram we are willing to look at. Anything past the fixed
/// header is ignored anyway.
const RECEIVE_BUFFER_SIZE: usize = 1024;

/// The wall-clock time believed correct at a given reading of the local
/// millisecond counter. Everything `now()` returns is interpolated from it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Anchor {
    timestamp: NtpTimestamp,
    counter: MillisInstant,
}

impl Anchor {
    /// Time assumed before the first successful synchronization,
    /// 2020-01-01T00:00:00Z.
    pub const UNSYNCHRONIZED_TIMESTAMP: NtpTimestamp =
        NtpTimestamp::from_parts(1_577_836_800 + EPOCH_OFFSET, 0);

    pub const fn new(timestamp: NtpTimestamp, counter: MillisInstant) -> Anchor {
        Anchor { timestamp, counter }
    }

    pub const fn unsynchronized(counter: MillisInstant) -> Anchor {
        Anchor::new(Self::UNSYNCHRONIZED_TIMESTAMP, counter)
    }

    pub fn timestamp(&self) -> NtpTimestamp {
        self.timestamp
    }

    pub fn counter(&self) -> MillisInstant {
        self.counter
    }

    /// Interpolated time at the given counter reading.
    pub fn now_at(&self, counter: MillisInstant) -> NtpTimestamp {
        self.timestamp.add_millis(counter.elapsed_since(self.counter))
    }
}

#[derive(Debug)]
pub enum SyncError {
    /// No response within the configured timeout
    Timeout,
    /// Opening the transport or sending the request failed
    Transport(std::io::Error),
    /// The response was not a valid NTP packet
    Parse(PacketParsingError),
    /// The server answered with a kiss-o'-death instead of a time
    KissCode(ReferenceId),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("no response from server within timeout"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Parse(e) => write!(f, "invalid response: {e}"),
            Self::KissCode(id) => write!(f, "server sent kiss code {id}"),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::Timeout | Self::KissCode(_) => None,
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(value: std::io::Error) -> Self {
        Self::Transport(value)
    }
}

impl From<PacketParsingError> for SyncError {
    fn from(value: PacketParsingError) -> Self {
        Self::Parse(value)
    }
}

/// Clock offset from the four timestamps of an exchange.
///
/// Positive when the server is ahead of us. Path delay is assumed to be
/// symmetric, so half of the asymmetry ends up in the offset.
pub fn clock_offset(
    origin: NtpTimestamp,
    receive: NtpTimestamp,
    transmit: NtpTimestamp,
    client_receive: NtpTimestamp,
) -> NtpDuration {
    ((receive - origin) + (transmit - client_receive)) / 2u32
}

/// Round trip delay of an exchange, excluding the time spent at the server.
pub fn round_trip_delay(
    origin: NtpTimestamp,
    receive: NtpTimestamp,
    transmit: NtpTimestamp,
    client_receive: NtpTimestamp,
) -> NtpDuration {
    (client_receive - origin) - (transmit - receive)
}

/// Perform a single exchange with the configured server and compute the
/// anchor that should replace `anchor`.
///
/// Blocks for at most `config.response_timeout` milliseconds of the local
/// counter while waiting for the response, calling [`LocalClock::relax`]
/// between polls. `anchor` is only read; on error the caller keeps it.
pub fn synchronize<T, C>(
    transport: &mut T,
    clock: &C,
    config: &ClientConfig,
    anchor: &Anchor,
) -> Result<Anchor, SyncError>
where
    T: NtpTransport + ?Sized,
    C: LocalClock + ?Sized,
{
    // Some servers echo a zero origin timestamp, in which case we fall back
    // to our own idea of when the request left.
    let fallback_origin = anchor.now_at(clock.now());

    let request = NtpHeader::poll_message(anchor.timestamp(), anchor.now_at(clock.now()));
    transport.send(&request.to_bytes(), &config.server, config.server_port)?;
    trace!(server = %config.server, "request sent");

    let wait_start = clock.now();
    loop {
        let pending = transport.poll_incoming()?;
        if pending > 0 {
            trace!(pending, "response pending");
            break;
        }

        if clock.now().elapsed_since(wait_start) > config.response_timeout {
            return Err(SyncError::Timeout);
        }

        clock.relax();
    }

    // Taken before reading and parsing to keep processing time out of the offset
    let client_receive = anchor.now_at(clock.now());

    let mut buf = [0u8; RECEIVE_BUFFER_SIZE];
    let len = transport.read(&mut buf)?;
    let response = NtpHeader::deserialize(&buf[..len])?;

    if response.is_kiss() {
        warn!(reference_id = %response.reference_id(), "server sent a kiss code");
        return Err(SyncError::KissCode(response.reference_id()));
    }

    let mut exchange = response.exchange_timestamps();
    if exchange.origin.ntp_seconds() == 0 {
        debug!(
            fallback = %fallback_origin,
            "server did not echo origin timestamp, using local send time"
        );
        exchange.origin = fallback_origin;
    }

    let offset = clock_offset(
        exchange.origin,
        exchange.receive,
        exchange.transmit,
        client_receive,
    );
    let delay = round_trip_delay(
        exchange.origin,
        exchange.receive,
        exchange.transmit,
        client_receive,
    );

    let counter = clock.now();
    let new_anchor = Anchor::new(anchor.now_at(counter).add_offset(offset), counter);
    debug!(%offset, %delay, time = %new_anchor.timestamp(), "synchronized with server");

    Ok(new_anchor)
}
