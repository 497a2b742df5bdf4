use std::fmt::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Why a buffer was not recognized as a Mode Adaptation framed baseband frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Reason {
    /// No bytes at all
    Empty,
    /// First byte was not the mode adaptation sync byte
    SyncByte(u8),
    /// Neither the 2 nor the 4 byte mode adaptation header is followed by a baseband header
    /// with a valid CRC-8
    NoValidBaseband,
}

impl Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty buffer"),
            Self::SyncByte(b) => write!(f, "bad sync byte 0x{b:02x}"),
            Self::NoValidBaseband => write!(f, "no baseband header with a valid crc"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The buffer does not belong to this protocol; zero bytes consumed.
    #[error("not dvb-s2 mode adaptation: {0}")]
    NotRecognized(Reason),
}

impl Error {
    /// Number of bytes consumed by a failed decode, which is always 0.
    #[must_use]
    pub fn consumed(&self) -> usize {
        0
    }

    #[must_use]
    pub fn is_not_recognized(&self) -> bool {
        matches!(self, Self::NotRecognized(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
