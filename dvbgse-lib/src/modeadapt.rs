//! DVB-S2 Mode Adaptation header.
//!
//! The mode adaptation header is a non-standard, but commonly used, physical layer header
//! prepended to baseband frames by DVB-S2 receivers and modulators. It carries the sync
//! byte 0xB8 followed by the PL signaling of the frame (FECFRAME size, pilots, MODCOD) and,
//! for the 4 byte variant, ACM feedback fields (carrier-to-noise and frame number).
//!
//! Nothing in the header indicates its own length. The length is resolved by locating a
//! baseband header with a valid CRC-8 right after the 2 byte variant, falling back to the
//! 4 byte variant.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{bbframe::BasebandHeader, error::Reason, Error, Result};

/// MODCOD names indexed by MODCOD value.
const MODCODS: [&str; 32] = [
    "DUMMY PLFRAME",
    "QPSK 1/4",
    "QPSK 1/3",
    "QPSK 2/5",
    "QPSK 1/2",
    "QPSK 3/5",
    "QPSK 2/3",
    "QPSK 3/4",
    "QPSK 4/5",
    "QPSK 5/6",
    "QPSK 8/9",
    "QPSK 9/10",
    "8PSK 3/5",
    "8PSK 2/3",
    "8PSK 3/4",
    "8PSK 5/6",
    "8PSK 8/9",
    "8PSK 9/10",
    "16APSK 2/3",
    "16APSK 3/4",
    "16APSK 4/5",
    "16APSK 5/6",
    "16APSK 8/9",
    "16APSK 9/10",
    "32APSK 3/4",
    "32APSK 4/5",
    "32APSK 5/6",
    "32APSK 8/9",
    "32APSK 9/10",
    "reserved",
    "reserved",
    "reserved",
];

/// Mode adaptation header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ModeAdaptationHeader {
    pub sync: u8,
    /// `true` for short (16200 bit) FECFRAMEs, `false` for normal (64800 bit)
    pub fecframe: bool,
    pub pilot: bool,
    pub modcod: u8,
    /// Carrier to noise indicator; only present in the 4 byte variant.
    pub cni: Option<u8>,
    /// Frame number; only present in the 4 byte variant.
    pub frame_number: Option<u8>,
}

impl ModeAdaptationHeader {
    /// Mode adaptation sync byte
    pub const SYNC: u8 = 0xb8;
    /// Length of the short variant
    pub const SHORT_LEN: usize = 2;
    /// Length of the variant carrying ACM fields
    pub const LONG_LEN: usize = 4;

    const FECFRAME_MASK: u8 = 0x40;
    const PILOT_MASK: u8 = 0x20;
    const MODCOD_MASK: u8 = 0x1f;

    /// Decode the header at the start of `dat`.
    ///
    /// The 2 byte variant is tried first and is used whenever the 10 bytes following it form
    /// a baseband header with a valid CRC-8. Otherwise the 4 byte variant is tried the same
    /// way.
    ///
    /// # Errors
    /// [Error::NotRecognized] if `dat` is empty, does not start with [Self::SYNC], or neither
    /// variant is followed by a valid baseband header.
    pub fn decode(dat: &[u8]) -> Result<Self> {
        let Some(&sync) = dat.first() else {
            return Err(Error::NotRecognized(Reason::Empty));
        };
        if sync != Self::SYNC {
            debug!(sync, "not a mode adaptation sync byte");
            return Err(Error::NotRecognized(Reason::SyncByte(sync)));
        }

        let len = if Self::baseband_follows(dat, Self::SHORT_LEN) {
            Self::SHORT_LEN
        } else if Self::baseband_follows(dat, Self::LONG_LEN) {
            Self::LONG_LEN
        } else {
            debug!(len = dat.len(), "no baseband header with valid crc");
            return Err(Error::NotRecognized(Reason::NoValidBaseband));
        };

        let b1 = dat[1];
        let (cni, frame_number) = if len == Self::LONG_LEN {
            (Some(dat[2]), Some(dat[3]))
        } else {
            (None, None)
        };

        Ok(ModeAdaptationHeader {
            sync,
            fecframe: b1 & Self::FECFRAME_MASK != 0,
            pilot: b1 & Self::PILOT_MASK != 0,
            modcod: b1 & Self::MODCOD_MASK,
            cni,
            frame_number,
        })
    }

    fn baseband_follows(dat: &[u8], offset: usize) -> bool {
        dat.len() >= offset + BasebandHeader::LEN
            && BasebandHeader::crc_valid(&dat[offset..offset + BasebandHeader::LEN])
    }

    /// Header length in bytes; also the offset of the baseband header.
    #[must_use]
    pub fn len(&self) -> usize {
        if self.cni.is_some() {
            Self::LONG_LEN
        } else {
            Self::SHORT_LEN
        }
    }

    #[must_use]
    pub fn modcod_name(&self) -> &'static str {
        MODCODS[(self.modcod & Self::MODCOD_MASK) as usize]
    }

    #[must_use]
    pub fn fecframe_name(&self) -> &'static str {
        if self.fecframe {
            "short"
        } else {
            "normal"
        }
    }
}
