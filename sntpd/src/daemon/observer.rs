use serde::Serialize;
use sntp_proto::{LocalClock, NtpClient, NtpTransport};

/// Point-in-time view of a client, as printed by `sntp-clock --once`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClockSnapshot {
    pub server: String,
    pub synchronized: bool,
    /// Seconds since 1970-01-01T00:00:00Z
    pub unix_seconds: u32,
    pub subsec_micros: u32,
    /// Raw 64 bit NTP timestamp
    pub ntp_timestamp: u64,
    pub utc: String,
    pub time_offset: i32,
    /// Current time shifted by the time offset, with the offset spelled out
    pub local: String,
}

impl ClockSnapshot {
    pub fn from_client<T: NtpTransport, C: LocalClock>(client: &NtpClient<T, C>) -> Self {
        let now = client.now();

        ClockSnapshot {
            server: client.config().server.clone(),
            synchronized: client.is_synchronized(),
            unix_seconds: now.unix_seconds(),
            subsec_micros: now.subsec_micros(),
            ntp_timestamp: now.to_fixed_int(),
            utc: now.to_string(),
            time_offset: client.time_offset(),
            local: client.local_time().to_string(),
        }
    }
}
