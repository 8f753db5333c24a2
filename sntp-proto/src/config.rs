use serde::Deserialize;

pub const DEFAULT_SERVER: &str = "time.nist.gov";
pub const NTP_PORT: u16 = 123;
pub const DEFAULT_LOCAL_PORT: u16 = 1337;
/// Minimum time between automatic resynchronizations, in milliseconds.
pub const DEFAULT_UPDATE_INTERVAL: u32 = 60_000;
/// Time to wait for a server response, in milliseconds.
pub const DEFAULT_RESPONSE_TIMEOUT: u32 = 1000;

fn default_server() -> String {
    DEFAULT_SERVER.to_owned()
}

const fn default_server_port() -> u16 {
    NTP_PORT
}

const fn default_local_port() -> u16 {
    DEFAULT_LOCAL_PORT
}

const fn default_update_interval() -> u32 {
    DEFAULT_UPDATE_INTERVAL
}

const fn default_response_timeout() -> u32 {
    DEFAULT_RESPONSE_TIMEOUT
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ClientConfig {
    /// Host name or address of the time server
    #[serde(default = "default_server")]
    pub server: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    /// UDP port the client listens on
    #[serde(default = "default_local_port")]
    pub local_port: u16,
    /// Shift applied to the time shown to users, in seconds (e.g. a timezone).
    /// It never influences synchronization.
    #[serde(default)]
    pub time_offset: i32,
    /// Minimum time between automatic resynchronizations, in milliseconds
    #[serde(default = "default_update_interval")]
    pub update_interval: u32,
    /// Maximum time to wait for a response, in milliseconds
    #[serde(default = "default_response_timeout")]
    pub response_timeout: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            server_port: default_server_port(),
            local_port: default_local_port(),
            time_offset: 0,
            update_interval: default_update_interval(),
            response_timeout: default_response_timeout(),
        }
    }
}

impl ClientConfig {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Self::default()
        }
    }

    pub fn with_time_offset(mut self, time_offset: i32) -> Self {
        self.time_offset = time_offset;
        self
    }

    pub fn with_update_interval(mut self, update_interval: u32) -> Self {
        self.update_interval = update_interval;
        self
    }

    pub fn with_local_port(mut self, local_port: u16) -> Self {
        self.local_port = local_port;
        self
    }
}
