use std::{cell::Cell, collections::VecDeque, io};

use crate::{
    clock::LocalClock,
    identifiers::ReferenceId,
    io::NtpTransport,
    packet::NtpHeader,
    time_types::{MillisInstant, NtpDuration, NtpTimestamp},
};

/// Millisecond counter that only moves when told to, or by a fixed step
/// every time the engine relaxes while waiting.
pub(crate) struct ManualClock {
    now: Cell<u32>,
    relax_step: u32,
}

impl ManualClock {
    pub(crate) fn new(start: u32) -> Self {
        Self::with_relax_step(start, 1)
    }

    pub(crate) fn with_relax_step(start: u32, relax_step: u32) -> Self {
        ManualClock {
            now: Cell::new(start),
            relax_step,
        }
    }

    pub(crate) fn advance(&self, millis: u32) {
        self.now.set(self.now.get().wrapping_add(millis));
    }
}

impl LocalClock for ManualClock {
    fn now(&self) -> MillisInstant {
        MillisInstant::from_millis(self.now.get())
    }

    fn relax(&self) {
        self.advance(self.relax_step);
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum ServerBehaviour {
    /// Answers with a clock that is this many seconds ahead of the request
    Ahead(i32),
    /// Like `Ahead`, but leaves the origin timestamp zero
    AheadWithoutEcho(i32),
    Silent,
    /// Answers with a datagram too short to be an NTP packet
    Truncated,
    Kiss(ReferenceId),
}

/// In-memory transport that answers requests according to a
/// [`ServerBehaviour`].
pub(crate) struct ScriptedTransport {
    pub(crate) behaviour: ServerBehaviour,
    pub(crate) open_port: Option<u16>,
    pub(crate) opened: usize,
    pub(crate) sent: Vec<(Vec<u8>, String, u16)>,
    inbox: VecDeque<Vec<u8>>,
    response_delay: usize,
    polls_until_ready: usize,
    fail_open: bool,
    fail_send: bool,
}

impl ScriptedTransport {
    pub(crate) fn new(behaviour: ServerBehaviour) -> Self {
        ScriptedTransport {
            behaviour,
            open_port: None,
            opened: 0,
            sent: vec![],
            inbox: VecDeque::new(),
            response_delay: 0,
            polls_until_ready: 0,
            fail_open: false,
            fail_send: false,
        }
    }

    /// Number of empty polls before a response becomes visible.
    pub(crate) fn with_response_delay(mut self, polls: usize) -> Self {
        self.response_delay = polls;
        self
    }

    pub(crate) fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub(crate) fn failing_send(mut self) -> Self {
        self.fail_send = true;
        self
    }

    fn respond(&self, request: &NtpHeader) -> Option<Vec<u8>> {
        let origin = request.origin_timestamp();
        let ahead = |seconds| origin + NtpDuration::from_whole_seconds(seconds);

        match self.behaviour {
            ServerBehaviour::Ahead(seconds) => Some(
                NtpHeader::test_response(origin, ahead(seconds), ahead(seconds))
                    .to_bytes()
                    .to_vec(),
            ),
            ServerBehaviour::AheadWithoutEcho(seconds) => Some(
                NtpHeader::test_response(NtpTimestamp::ZERO, ahead(seconds), ahead(seconds))
                    .to_bytes()
                    .to_vec(),
            ),
            ServerBehaviour::Silent => None,
            ServerBehaviour::Truncated => Some(vec![0x24; 20]),
            ServerBehaviour::Kiss(code) => {
                Some(NtpHeader::test_kiss(origin, code).to_bytes().to_vec())
            }
        }
    }
}

impl NtpTransport for ScriptedTransport {
    fn open(&mut self, local_port: u16) -> io::Result<()> {
        if self.fail_open {
            return Err(io::Error::new(io::ErrorKind::AddrInUse, "port in use"));
        }
        self.open_port = Some(local_port);
        self.opened += 1;
        Ok(())
    }

    fn send(&mut self, datagram: &[u8], host: &str, port: u16) -> io::Result<()> {
        if self.fail_send {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "cannot send"));
        }
        self.sent.push((datagram.to_vec(), host.to_owned(), port));

        let request = NtpHeader::deserialize(datagram)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        if let Some(response) = self.respond(&request) {
            self.inbox.push_back(response);
            self.polls_until_ready = self.response_delay;
        }
        Ok(())
    }

    fn poll_incoming(&mut self) -> io::Result<usize> {
        if self.polls_until_ready > 0 {
            self.polls_until_ready -= 1;
            return Ok(0);
        }
        Ok(self.inbox.front().map(Vec::len).unwrap_or(0))
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inbox.pop_front() {
            Some(datagram) => {
                let len = datagram.len().min(buf.len());
                buf[..len].copy_from_slice(&datagram[..len]);
                Ok(len)
            }
            None => Err(io::ErrorKind::WouldBlock.into()),
        }
    }

    fn close(&mut self) {
        self.open_port = None;
        self.inbox.clear();
    }
}
