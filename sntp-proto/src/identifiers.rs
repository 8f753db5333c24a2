use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReferenceId(u32);

impl ReferenceId {
    /// Placeholder sent in the reference id field of every request.
    /// Servers do not look at it for client packets.
    pub const CLIENT_REQUEST: ReferenceId = ReferenceId(u32::from_be_bytes(*b"1N14"));

    // Note: Names chosen to match the identifiers given in rfc5905
    pub const KISS_DENY: ReferenceId = ReferenceId(u32::from_be_bytes(*b"DENY"));
    pub const KISS_RATE: ReferenceId = ReferenceId(u32::from_be_bytes(*b"RATE"));
    pub const KISS_RSTR: ReferenceId = ReferenceId(u32::from_be_bytes(*b"RSTR"));

    pub const fn from_int(value: u32) -> ReferenceId {
        ReferenceId(value)
    }

    pub fn is_deny(&self) -> bool {
        *self == Self::KISS_DENY
    }

    pub fn is_rate(&self) -> bool {
        *self == Self::KISS_RATE
    }

    pub fn is_rstr(&self) -> bool {
        *self == Self::KISS_RSTR
    }

    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    pub const fn from_bytes(bits: [u8; 4]) -> ReferenceId {
        ReferenceId(u32::from_be_bytes(bits))
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.to_bytes();
        if bytes.iter().all(|b| b.is_ascii_graphic()) {
            bytes.iter().try_for_each(|b| write!(f, "{}", *b as char))
        } else {
            write!(f, "{:#010x}", self.0)
        }
    }
}
