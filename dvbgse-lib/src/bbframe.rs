//! DVB-S2 baseband frames (EN 302 307-1, section 5.1).
use std::{fmt::Display, ops::Range};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::{
    gse::{GseFrame, GseHeader, SinkRegistry},
    integrity::check_crc8,
    DecodeOpts,
};

/// Transport stream or generic stream input (TS/GS field of MATYPE-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StreamType {
    GenericPacketized,
    GenericContinuous,
    Reserved,
    Transport,
}

impl From<u8> for StreamType {
    fn from(value: u8) -> Self {
        match value & 0x3 {
            0 => Self::GenericPacketized,
            1 => Self::GenericContinuous,
            2 => Self::Reserved,
            _ => Self::Transport,
        }
    }
}

impl Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::GenericPacketized => "Generic Packetized",
            Self::GenericContinuous => "Generic Continuous",
            Self::Reserved => "reserved",
            Self::Transport => "Transport",
        };
        f.write_str(s)
    }
}

/// Baseband header (BBHEADER).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BasebandHeader {
    /// TS/GS, see [StreamType]
    pub gs: u8,
    /// `true` for a single input stream, `false` for multiple
    pub mis_sis: bool,
    /// Raw CCM/ACM bit, set for constant coding and modulation. See [Self::is_ccm] and
    /// [Self::is_acm].
    pub acm: bool,
    /// Input stream synchronization indicator active
    pub issyi: bool,
    /// Null-packet deletion active
    pub npd: bool,
    /// Transmission roll-off
    pub ro: u8,
    /// Input stream identifier when multiple streams, otherwise reserved
    pub matype2: u8,
    /// User packet length in bits
    pub upl: u16,
    /// Data field length in bits
    pub dfl: u16,
    pub sync: u8,
    pub syncd: u16,
    pub crc8: u8,
}

impl BasebandHeader {
    /// Baseband header length in bytes
    pub const LEN: usize = 10;

    /// Construct from the provided bytes, or `None` if there are not enough bytes.
    ///
    /// The CRC-8 is not checked, see [Self::crc_valid].
    #[must_use]
    pub fn decode(dat: &[u8]) -> Option<Self> {
        if dat.len() < Self::LEN {
            return None;
        }
        let matype1 = dat[0];
        Some(BasebandHeader {
            gs: (matype1 >> 6) & 0x3,
            mis_sis: (matype1 >> 5) & 0x1 == 1,
            acm: (matype1 >> 4) & 0x1 == 1,
            issyi: (matype1 >> 3) & 0x1 == 1,
            npd: (matype1 >> 2) & 0x1 == 1,
            ro: matype1 & 0x3,
            matype2: dat[1],
            upl: u16::from_be_bytes([dat[2], dat[3]]),
            dfl: u16::from_be_bytes([dat[4], dat[5]]),
            sync: dat[6],
            syncd: u16::from_be_bytes([dat[7], dat[8]]),
            crc8: dat[9],
        })
    }

    /// Return `true` if `dat` starts with a header whose CRC-8 over the first 9 bytes
    /// matches the 10th.
    #[must_use]
    pub fn crc_valid(dat: &[u8]) -> bool {
        dat.len() >= Self::LEN && check_crc8(&dat[..Self::LEN - 1], dat[Self::LEN - 1])
    }

    /// Constant coding and modulation.
    #[must_use]
    pub fn is_ccm(&self) -> bool {
        self.acm
    }

    /// Adaptive or variable coding and modulation.
    #[must_use]
    pub fn is_acm(&self) -> bool {
        !self.acm
    }

    #[must_use]
    pub fn stream_type(&self) -> StreamType {
        StreamType::from(self.gs)
    }

    /// Input stream identifier, only available for multiple input streams.
    #[must_use]
    pub fn isi(&self) -> Option<u8> {
        if self.mis_sis {
            None
        } else {
            Some(self.matype2)
        }
    }

    /// Roll-off factor, or `None` for the reserved value.
    #[must_use]
    pub fn rolloff(&self) -> Option<f32> {
        match self.ro {
            0 => Some(0.35),
            1 => Some(0.25),
            2 => Some(0.20),
            _ => None,
        }
    }

    /// Number of data field bytes following the header.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.dfl as usize / 8
    }
}

/// Why decoding the GSE frames of a baseband frame stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TruncationReason {
    /// Not enough bytes left in the buffer for a GSE header
    NoHeader,
    /// The declared frame length is more than what is left of the data field
    ExceedsDataField,
    /// The declared frame fits the data field but the buffer ends first
    ExceedsBuffer,
    /// The declared frame length is too small for the fields its header requires
    Malformed,
}

impl Display for TruncationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NoHeader => "no room for GSE header",
            Self::ExceedsDataField => "frame exceeds data field",
            Self::ExceedsBuffer => "frame exceeds buffer",
            Self::Malformed => "length too small for header fields",
        };
        f.write_str(s)
    }
}

/// Records where and why decoding the GSE frames of a baseband frame was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Truncation {
    pub reason: TruncationReason,
    /// Offset of the GSE frame that could not be decoded
    pub offset: usize,
    /// The GSE header, if there were enough bytes to read one
    pub header: Option<GseHeader>,
    /// Frame length declared by `header`, 0 when there is no header
    pub declared: usize,
    /// Data field bytes left when decoding stopped
    pub remaining: usize,
}

/// A decoded baseband frame and the GSE frames in its data field.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BasebandFrame {
    pub offset: usize,
    pub header: BasebandHeader,
    pub crc_valid: bool,
    pub frames: Vec<GseFrame>,
    pub truncation: Option<Truncation>,
    /// Data field bytes not consumed by any GSE frame
    pub trailing: Range<usize>,
}

impl BasebandFrame {
    /// Decode the baseband frame starting at `offset` in `buf` and each GSE frame in its
    /// data field.
    ///
    /// GSE frames are decoded until the `dfl / 8` data field bytes are used up. Decoding
    /// stops early, recording a [Truncation], when a GSE frame declares more bytes than are
    /// left in the data field or in `buf`, or declares too few for its own header fields.
    /// Fewer than 2 bytes left over is treated as padding.
    ///
    /// Returns `None` if there are not enough bytes for the baseband header.
    #[must_use]
    pub fn decode(
        buf: &[u8],
        offset: usize,
        opts: &DecodeOpts,
        sinks: &mut SinkRegistry,
    ) -> Option<Self> {
        let header = BasebandHeader::decode(buf.get(offset..)?)?;
        let crc_valid = BasebandHeader::crc_valid(&buf[offset..]);

        let data_start = offset + BasebandHeader::LEN;
        let data_end = (data_start + header.payload_len()).min(buf.len());
        let mut remaining = header.payload_len();
        let mut cur = data_start;
        let mut frames = Vec::new();
        let mut truncation = None;

        while remaining > 0 {
            let Some(gse) = GseHeader::decode(&buf[cur..]) else {
                warn!(offset = cur, remaining, "no room for gse header");
                truncation = Some(Truncation {
                    reason: TruncationReason::NoHeader,
                    offset: cur,
                    header: None,
                    declared: 0,
                    remaining,
                });
                break;
            };
            let declared = gse.frame_len();
            let available = buf.len() - cur;
            let frame = if declared > remaining {
                Err(TruncationReason::ExceedsDataField)
            } else if declared > available {
                Err(TruncationReason::ExceedsBuffer)
            } else {
                GseFrame::decode(&buf[cur..], cur).ok_or(TruncationReason::Malformed)
            };
            let mut frame = match frame {
                Ok(frame) => frame,
                Err(reason) => {
                    warn!(
                        offset = cur,
                        declared,
                        remaining,
                        available,
                        %reason,
                        "gse frame does not fit baseband data field"
                    );
                    truncation = Some(Truncation {
                        reason,
                        offset: cur,
                        header: Some(gse),
                        declared,
                        remaining,
                    });
                    break;
                }
            };

            frame.dispatch(buf, opts, sinks);
            frames.push(frame);
            cur += declared;
            remaining -= declared;
            if remaining < GseHeader::LEN {
                remaining = 0;
            }
        }

        trace!(
            offset,
            dfl = header.dfl,
            num_frames = frames.len(),
            "baseband frame"
        );

        Some(BasebandFrame {
            offset,
            header,
            crc_valid,
            frames,
            truncation,
            trailing: cur..data_end.max(cur),
        })
    }

    /// Bytes consumed by this frame, i.e., the header and all decoded GSE frames.
    #[must_use]
    pub fn len(&self) -> usize {
        BasebandHeader::LEN + self.frames.iter().map(GseFrame::len).sum::<usize>()
    }
}
