use tracing::{debug, info, warn};

use crate::{
    clock::LocalClock,
    config::ClientConfig,
    io::NtpTransport,
    sync::{synchronize, Anchor, SyncError},
    time_types::{LocalTime, MillisInstant, NtpTimestamp},
};

/// SNTP client keeping an interpolated estimate of the current time.
///
/// Time is tracked as an [`Anchor`]: the wall-clock time at some reading of
/// the local millisecond counter. Between synchronizations the time is
/// extrapolated from the counter, and every successful exchange with the
/// server replaces the anchor. Failed exchanges leave the anchor alone, so
/// the client keeps running on the last known good time.
///
/// Before the first successful exchange the client reports a time starting
/// at 2020-01-01T00:00:00Z, see [`NtpClient::is_synchronized`].
///
/// All methods are synchronous. [`NtpClient::update`] and
/// [`NtpClient::force_update`] block for up to the configured response
/// timeout when a request is sent.
#[derive(Debug)]
pub struct NtpClient<T: NtpTransport, C: LocalClock> {
    transport: T,
    clock: C,
    config: ClientConfig,
    anchor: Anchor,
    last_attempt: Option<MillisInstant>,
    synchronized: bool,
    transport_open: bool,
}

impl<T: NtpTransport, C: LocalClock> NtpClient<T, C> {
    pub fn new(transport: T, clock: C, config: ClientConfig) -> Self {
        let anchor = Anchor::unsynchronized(clock.now());
        NtpClient {
            transport,
            clock,
            config,
            anchor,
            last_attempt: None,
            synchronized: false,
            transport_open: false,
        }
    }

    /// Open the transport on the configured local port and reset the clock
    /// state to unsynchronized.
    pub fn begin(&mut self) -> std::io::Result<()> {
        self.begin_with_port(self.config.local_port)
    }

    pub fn begin_with_port(&mut self, local_port: u16) -> std::io::Result<()> {
        self.config.local_port = local_port;
        if self.transport_open {
            self.transport.close();
            self.transport_open = false;
        }

        self.anchor = Anchor::unsynchronized(self.clock.now());
        self.last_attempt = None;
        self.synchronized = false;

        self.open_transport()
    }

    fn open_transport(&mut self) -> std::io::Result<()> {
        if !self.transport_open {
            self.transport.open(self.config.local_port)?;
            self.transport_open = true;
            debug!(local_port = self.config.local_port, "transport opened");
        }
        Ok(())
    }

    /// Synchronize with the server if the client was never synchronized, or
    /// if the update interval has passed since the last attempt.
    ///
    /// Returns whether the clock is in a good state: `true` when nothing
    /// needed doing or the exchange succeeded, `false` when a due exchange
    /// failed. An unsynchronized client retries on every call. Once
    /// synchronized, failed attempts count towards the interval.
    pub fn update(&mut self) -> bool {
        let interval_passed = match self.last_attempt {
            None => true,
            Some(last) => self.clock.now().elapsed_since(last) >= self.config.update_interval,
        };
        let due = !self.synchronized || interval_passed;

        if due {
            self.force_update()
        } else {
            true
        }
    }

    /// Synchronize with the server right away, regardless of the interval.
    pub fn force_update(&mut self) -> bool {
        match self.try_force_update() {
            Ok(()) => true,
            Err(error) => {
                warn!(%error, server = %self.config.server, "could not synchronize");
                false
            }
        }
    }

    /// Like [`NtpClient::force_update`], but reports why an attempt failed.
    pub fn try_force_update(&mut self) -> Result<(), SyncError> {
        let result = match self.open_transport() {
            Ok(()) => synchronize(&mut self.transport, &self.clock, &self.config, &self.anchor),
            Err(e) => Err(SyncError::Transport(e)),
        };
        self.last_attempt = Some(self.clock.now());

        let anchor = result?;
        if !self.synchronized {
            info!(time = %anchor.timestamp(), server = %self.config.server, "clock synchronized");
        }
        self.anchor = anchor;
        self.synchronized = true;
        Ok(())
    }

    /// Current time in UTC, interpolated from the last anchor.
    pub fn now(&self) -> NtpTimestamp {
        self.anchor.now_at(self.clock.now())
    }

    /// Current time shifted by the configured time offset. This is the value
    /// that should be shown to users.
    pub fn local_now(&self) -> NtpTimestamp {
        self.local_time().wall_clock()
    }

    /// Current time together with the configured time offset, for display.
    pub fn local_time(&self) -> LocalTime {
        LocalTime::new(self.now(), self.config.time_offset)
    }

    pub fn set_time_offset(&mut self, time_offset: i32) {
        self.config.time_offset = time_offset;
    }

    pub fn time_offset(&self) -> i32 {
        self.config.time_offset
    }

    /// Set the minimum number of milliseconds between automatic updates.
    pub fn set_update_interval(&mut self, update_interval: u32) {
        self.config.update_interval = update_interval;
    }

    pub fn update_interval(&self) -> u32 {
        self.config.update_interval
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    /// Whether at least one exchange with the server succeeded since
    /// creation or the last [`NtpClient::begin`].
    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Release the transport. The current time estimate is kept, and the
    /// next update opens the transport again.
    pub fn end(&mut self) {
        if self.transport_open {
            self.transport.close();
            self.transport_open = false;
            debug!("transport closed");
        }
    }
}
