mod daemon;

pub use daemon::clock::MonotonicMillis;
pub use daemon::main as daemon_main;
pub use daemon::transport::UdpTransport;
pub use daemon::{ClockSnapshot, Config};
