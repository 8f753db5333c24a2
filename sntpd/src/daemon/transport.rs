use std::{
    io::{self, ErrorKind},
    net::{Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket},
};

use sntp_proto::NtpTransport;
use tracing::{debug, trace};

const MAX_DATAGRAM_SIZE: usize = 1024;

/// [`NtpTransport`] over a non-blocking IPv4 UDP socket.
///
/// Only datagrams coming from the address the last request was sent to are
/// reported; anything else arriving on the port is dropped.
#[derive(Debug, Default)]
pub struct UdpTransport {
    socket: Option<UdpSocket>,
    peer: Option<SocketAddr>,
}

impl UdpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket()?.local_addr()
    }

    fn socket(&self) -> io::Result<&UdpSocket> {
        self.socket
            .as_ref()
            .ok_or_else(|| io::Error::new(ErrorKind::NotConnected, "transport is not open"))
    }

    fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
        (host, port)
            .to_socket_addrs()?
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| {
                io::Error::new(
                    ErrorKind::NotFound,
                    format!("no IPv4 address found for {host}"),
                )
            })
    }

    /// Throw away anything still queued, such as late answers to a request
    /// that already timed out.
    fn discard_pending(socket: &UdpSocket) -> io::Result<()> {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        loop {
            match socket.recv_from(&mut buf) {
                Ok((len, source)) => trace!(len, %source, "discarding stale datagram"),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }
}

impl NtpTransport for UdpTransport {
    fn open(&mut self, local_port: u16) -> io::Result<()> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, local_port))?;
        socket.set_nonblocking(true)?;
        debug!(local_addr = ?socket.local_addr(), "udp socket bound");

        self.socket = Some(socket);
        self.peer = None;
        Ok(())
    }

    fn send(&mut self, datagram: &[u8], host: &str, port: u16) -> io::Result<()> {
        let peer = Self::resolve(host, port)?;
        let socket = self.socket()?;

        Self::discard_pending(socket)?;
        socket.send_to(datagram, peer)?;
        self.peer = Some(peer);
        Ok(())
    }

    fn poll_incoming(&mut self) -> io::Result<usize> {
        let socket = self.socket()?;
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];

        loop {
            match socket.peek_from(&mut buf) {
                Ok((len, source)) if self.peer.map_or(true, |peer| peer == source) => {
                    return Ok(len)
                }
                Ok((_, source)) => {
                    debug!(%source, "dropping datagram from unexpected source");
                    socket.recv_from(&mut buf)?;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(0),
                Err(e) => return Err(e),
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let (len, _) = self.socket()?.recv_from(buf)?;
        Ok(len)
    }

    fn close(&mut self) {
        self.socket = None;
        self.peer = None;
    }
}
