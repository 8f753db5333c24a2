use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketParsingError {
    IncorrectLength(usize),
}

impl Display for PacketParsingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IncorrectLength(len) => {
                f.write_fmt(format_args!("Incorrect packet length {len}"))
            }
        }
    }
}

impl std::error::Error for PacketParsingError {}
