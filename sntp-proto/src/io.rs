/// Datagram transport used to talk to the time server.
///
/// The interface is deliberately poll based: the synchronization engine asks
/// whether a datagram is pending and only then reads it, so that it can
/// take the client receive timestamp as close to arrival as possible.
/// Resolving `host` to an address is the responsibility of the transport.
pub trait NtpTransport {
    /// Start listening on `local_port`.
    fn open(&mut self, local_port: u16) -> std::io::Result<()>;

    fn send(&mut self, datagram: &[u8], host: &str, port: u16) -> std::io::Result<()>;

    /// Size of the next pending datagram, 0 if nothing has arrived yet.
    fn poll_incoming(&mut self) -> std::io::Result<usize>;

    /// Consume the next pending datagram, returning the number of bytes
    /// copied into `buf`.
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    fn close(&mut self);
}

impl<T: NtpTransport + ?Sized> NtpTransport for Box<T> {
    fn open(&mut self, local_port: u16) -> std::io::Result<()> {
        (**self).open(local_port)
    }

    fn send(&mut self, datagram: &[u8], host: &str, port: u16) -> std::io::Result<()> {
        (**self).send(datagram, host, port)
    }

    fn poll_incoming(&mut self) -> std::io::Result<usize> {
        (**self).poll_incoming()
    }

    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        (**self).read(buf)
    }

    fn close(&mut self) {
        (**self).close()
    }
}
