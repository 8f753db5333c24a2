use crate::{
    identifiers::ReferenceId,
    time_types::{NtpDuration, NtpTimestamp},
};

mod error;

pub use error::PacketParsingError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NtpLeapIndicator {
    NoWarning,
    Leap61,
    Leap59,
    Unknown,
}

impl NtpLeapIndicator {
    // This function should only ever be called with 2 bit values
    // (in the least significant position)
    fn from_bits(bits: u8) -> NtpLeapIndicator {
        match bits & 0x03 {
            0 => NtpLeapIndicator::NoWarning,
            1 => NtpLeapIndicator::Leap61,
            2 => NtpLeapIndicator::Leap59,
            _ => NtpLeapIndicator::Unknown,
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            NtpLeapIndicator::NoWarning => 0,
            NtpLeapIndicator::Leap61 => 1,
            NtpLeapIndicator::Leap59 => 2,
            NtpLeapIndicator::Unknown => 3,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NtpAssociationMode {
    Reserved,
    SymmetricActive,
    SymmetricPassive,
    Client,
    Server,
    Broadcast,
    Control,
    Private,
}

impl NtpAssociationMode {
    // This function should only ever be called with 3 bit values
    // (in the least significant position)
    fn from_bits(bits: u8) -> NtpAssociationMode {
        match bits & 0x07 {
            0 => NtpAssociationMode::Reserved,
            1 => NtpAssociationMode::SymmetricActive,
            2 => NtpAssociationMode::SymmetricPassive,
            3 => NtpAssociationMode::Client,
            4 => NtpAssociationMode::Server,
            5 => NtpAssociationMode::Broadcast,
            6 => NtpAssociationMode::Control,
            _ => NtpAssociationMode::Private,
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            NtpAssociationMode::Reserved => 0,
            NtpAssociationMode::SymmetricActive => 1,
            NtpAssociationMode::SymmetricPassive => 2,
            NtpAssociationMode::Client => 3,
            NtpAssociationMode::Server => 4,
            NtpAssociationMode::Broadcast => 5,
            NtpAssociationMode::Control => 6,
            NtpAssociationMode::Private => 7,
        }
    }
}

/// The fixed 48 byte part of an NTP packet, as described in rfc5905.
///
/// Extension fields and MACs are not supported; any bytes following the
/// header in a received datagram are ignored.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NtpHeader {
    leap: NtpLeapIndicator,
    version: u8,
    mode: NtpAssociationMode,
    stratum: u8,
    poll: i8,
    precision: i8,
    root_delay: NtpDuration,
    root_dispersion: NtpDuration,
    reference_id: ReferenceId,
    reference_timestamp: NtpTimestamp,
    /// Time at the client when the request departed for the server
    origin_timestamp: NtpTimestamp,
    /// Time at the server when the request arrived from the client
    receive_timestamp: NtpTimestamp,
    /// Time at the server when the response left for the client
    transmit_timestamp: NtpTimestamp,
}

/// Timestamps of a response that take part in the offset calculation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExchangeTimestamps {
    pub origin: NtpTimestamp,
    pub receive: NtpTimestamp,
    pub transmit: NtpTimestamp,
}

fn read_array<const N: usize>(data: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&data[offset..offset + N]);
    out
}

impl NtpHeader {
    pub const WIRE_LENGTH: usize = 48;

    const CLIENT_VERSION: u8 = 4;
    const CLIENT_POLL: i8 = 6;
    const CLIENT_PRECISION: i8 = -20;

    /// A new, empty NtpHeader
    fn new() -> Self {
        Self {
            leap: NtpLeapIndicator::NoWarning,
            version: Self::CLIENT_VERSION,
            mode: NtpAssociationMode::Client,
            stratum: 0,
            poll: 0,
            precision: 0,
            root_delay: NtpDuration::default(),
            root_dispersion: NtpDuration::default(),
            reference_id: ReferenceId::from_int(0),
            reference_timestamp: NtpTimestamp::default(),
            origin_timestamp: NtpTimestamp::default(),
            receive_timestamp: NtpTimestamp::default(),
            transmit_timestamp: NtpTimestamp::default(),
        }
    }

    /// Client request carrying our current reference time and the time of sending.
    ///
    /// The leap indicator is "unknown" as the client does not claim to be
    /// synchronized. Receive and transmit timestamps stay zero.
    pub fn poll_message(reference: NtpTimestamp, origin: NtpTimestamp) -> Self {
        Self {
            leap: NtpLeapIndicator::Unknown,
            mode: NtpAssociationMode::Client,
            stratum: 0,
            poll: Self::CLIENT_POLL,
            precision: Self::CLIENT_PRECISION,
            reference_id: ReferenceId::CLIENT_REQUEST,
            reference_timestamp: reference,
            origin_timestamp: origin,
            ..Self::new()
        }
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, PacketParsingError> {
        if data.len() < Self::WIRE_LENGTH {
            return Err(PacketParsingError::IncorrectLength(data.len()));
        }

        Ok(Self {
            leap: NtpLeapIndicator::from_bits((data[0] & 0xC0) >> 6),
            version: (data[0] & 0x38) >> 3,
            mode: NtpAssociationMode::from_bits(data[0] & 0x07),
            stratum: data[1],
            poll: data[2] as i8,
            precision: data[3] as i8,
            root_delay: NtpDuration::from_bits_short(read_array(data, 4)),
            root_dispersion: NtpDuration::from_bits_short(read_array(data, 8)),
            reference_id: ReferenceId::from_bytes(read_array(data, 12)),
            reference_timestamp: NtpTimestamp::from_bits(read_array(data, 16)),
            origin_timestamp: NtpTimestamp::from_bits(read_array(data, 24)),
            receive_timestamp: NtpTimestamp::from_bits(read_array(data, 32)),
            transmit_timestamp: NtpTimestamp::from_bits(read_array(data, 40)),
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::WIRE_LENGTH] {
        let mut buf = [0u8; Self::WIRE_LENGTH];
        buf[0] = (self.leap.to_bits() << 6) | ((self.version & 0x07) << 3) | self.mode.to_bits();
        buf[1] = self.stratum;
        buf[2] = self.poll as u8;
        buf[3] = self.precision as u8;
        buf[4..8].copy_from_slice(&self.root_delay.to_bits_short());
        buf[8..12].copy_from_slice(&self.root_dispersion.to_bits_short());
        buf[12..16].copy_from_slice(&self.reference_id.to_bytes());
        buf[16..24].copy_from_slice(&self.reference_timestamp.to_bits());
        buf[24..32].copy_from_slice(&self.origin_timestamp.to_bits());
        buf[32..40].copy_from_slice(&self.receive_timestamp.to_bits());
        buf[40..48].copy_from_slice(&self.transmit_timestamp.to_bits());
        buf
    }

    pub fn serialize<W: std::io::Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(&self.to_bytes())
    }

    pub fn exchange_timestamps(&self) -> ExchangeTimestamps {
        ExchangeTimestamps {
            origin: self.origin_timestamp,
            receive: self.receive_timestamp,
            transmit: self.transmit_timestamp,
        }
    }

    pub fn leap(&self) -> NtpLeapIndicator {
        self.leap
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn mode(&self) -> NtpAssociationMode {
        self.mode
    }

    pub fn stratum(&self) -> u8 {
        self.stratum
    }

    pub fn poll(&self) -> i8 {
        self.poll
    }

    pub fn precision(&self) -> i8 {
        self.precision
    }

    pub fn root_delay(&self) -> NtpDuration {
        self.root_delay
    }

    pub fn root_dispersion(&self) -> NtpDuration {
        self.root_dispersion
    }

    pub fn reference_id(&self) -> ReferenceId {
        self.reference_id
    }

    pub fn reference_timestamp(&self) -> NtpTimestamp {
        self.reference_timestamp
    }

    pub fn origin_timestamp(&self) -> NtpTimestamp {
        self.origin_timestamp
    }

    pub fn receive_timestamp(&self) -> NtpTimestamp {
        self.receive_timestamp
    }

    pub fn transmit_timestamp(&self) -> NtpTimestamp {
        self.transmit_timestamp
    }

    pub fn is_kiss(&self) -> bool {
        self.stratum == 0 && self.mode == NtpAssociationMode::Server
    }
}

#[cfg(any(test, feature = "__internal-test"))]
impl NtpHeader {
    pub fn test_response(
        origin: NtpTimestamp,
        receive: NtpTimestamp,
        transmit: NtpTimestamp,
    ) -> Self {
        Self {
            mode: NtpAssociationMode::Server,
            stratum: 2,
            poll: Self::CLIENT_POLL,
            precision: -23,
            reference_id: ReferenceId::from_int(0xc035676c),
            reference_timestamp: receive,
            origin_timestamp: origin,
            receive_timestamp: receive,
            transmit_timestamp: transmit,
            ..Self::new()
        }
    }

    pub fn test_kiss(origin: NtpTimestamp, code: ReferenceId) -> Self {
        Self {
            mode: NtpAssociationMode::Server,
            stratum: 0,
            reference_id: code,
            origin_timestamp: origin,
            ..Self::new()
        }
    }
}
