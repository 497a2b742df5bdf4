//! Generic Stream Encapsulation (ETSI TS 102 606) packets and fragments.
//!
//! Each GSE frame starts with a 2 byte header carrying the start/stop flags, the label type,
//! and the number of bytes that follow the header. What follows depends on the flags:
//!
//! | field          | present when                        |
//! |----------------|-------------------------------------|
//! | `frag_id`      | not both start and stop             |
//! | `total_length` | start and not stop                  |
//! | `protocol_type`| start                               |
//! | label          | start, sized by the label type      |
//! | `ext_header`   | start and protocol type in 0x0100..0x0600 |
//! | payload        | always, possibly empty              |
//! | `crc32`        | stop and not start                  |
mod sink;

pub use sink::*;

use std::{fmt::Display, ops::Range};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::DecodeOpts;

/// GSE frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GseHeader {
    pub start: bool,
    pub stop: bool,
    pub label_type: u8,
    /// Number of bytes following the header, including any trailing CRC-32
    pub length: u16,
}

impl GseHeader {
    /// GSE header length in bytes
    pub const LEN: usize = 2;

    /// Construct from the provided bytes, or `None` if there are not enough bytes.
    #[must_use]
    pub fn decode(dat: &[u8]) -> Option<Self> {
        if dat.len() < Self::LEN {
            return None;
        }
        let x = u16::from_be_bytes([dat[0], dat[1]]);
        Some(GseHeader {
            start: (x >> 15) & 0x1 == 1,
            stop: (x >> 14) & 0x1 == 1,
            label_type: ((x >> 12) & 0x3) as u8,
            length: x & 0xfff,
        })
    }

    /// All of start, stop, and label type zero denotes 2 bytes of padding, whatever the
    /// length field says.
    #[must_use]
    pub fn is_padding(&self) -> bool {
        !self.start && !self.stop && self.label_type == 0
    }

    #[must_use]
    pub fn has_frag_id(&self) -> bool {
        !(self.start && self.stop)
    }

    #[must_use]
    pub fn has_total_length(&self) -> bool {
        self.start && !self.stop
    }

    #[must_use]
    pub fn has_crc32(&self) -> bool {
        !self.start && self.stop
    }

    /// Number of label bytes carried by a frame with the start flag set.
    #[must_use]
    pub fn label_len(&self) -> usize {
        match self.label_type {
            0 => 6,
            1 => 3,
            _ => 0,
        }
    }

    /// Total number of bytes occupied by the frame, including this header.
    #[must_use]
    pub fn frame_len(&self) -> usize {
        if self.is_padding() {
            Self::LEN
        } else {
            Self::LEN + self.length as usize
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Label {
    /// 6 byte label, typically a MAC address
    Mac([u8; 6]),
    Short([u8; 3]),
    /// No label, the PDU is for all receivers
    Broadcast,
    /// No label, the label of the previous PDU applies
    ReUse,
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mac(b) => write!(
                f,
                "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
                b[0], b[1], b[2], b[3], b[4], b[5]
            ),
            Self::Short(b) => write!(f, "{:02x}:{:02x}:{:02x}", b[0], b[1], b[2]),
            Self::Broadcast => write!(f, "broadcast"),
            Self::ReUse => write!(f, "re-use"),
        }
    }
}

/// Role of a frame in carrying a PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FrameKind {
    Padding,
    /// Unfragmented PDU
    Complete,
    First,
    Continuation,
    Last,
}

/// What happened to the payload of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Payload {
    /// Exposed as bytes only
    #[default]
    Opaque,
    /// Handed to the [ProtocolSink] registered for the protocol type
    Dissected,
}

/// Name of a GSE protocol type, if it is a well known one.
#[must_use]
pub fn protocol_name(protocol_type: u16) -> Option<&'static str> {
    Some(match protocol_type {
        0x0000 => "Test SNDU",
        0x0001 => "Bridged frame",
        0x0002 => "TS-Concat",
        0x0003 => "PDU-Concat",
        PROTOCOL_IPV4 => "IPv4",
        0x0806 => "ARP",
        0x8100 => "802.1Q",
        PROTOCOL_IPV6 => "IPv6",
        _ => return None,
    })
}

/// A single GSE frame, either a complete PDU, a PDU fragment, or padding.
///
/// Offsets and ranges are relative to the start of the buffer being decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GseFrame {
    pub offset: usize,
    pub header: GseHeader,
    pub frag_id: Option<u8>,
    pub total_length: Option<u16>,
    pub protocol_type: Option<u16>,
    pub label: Option<Label>,
    pub ext_header: Option<u8>,
    pub payload: Range<usize>,
    pub disposition: Payload,
    /// Trailing CRC-32 of a last fragment; not verified.
    pub crc32: Option<u32>,
}

impl GseFrame {
    /// Range of protocol types followed by an extension header byte
    const EXT_HEADER_TYPES: Range<u16> = 0x0100..0x0600;

    /// Decode a frame from `dat`, which must start with the GSE header. `offset` is the
    /// position of `dat` in the overall buffer and is used for all ranges.
    ///
    /// Returns `None` if `dat` is shorter than the frame length declared by the header or
    /// if the declared length cannot hold the fields the header says are present.
    #[must_use]
    pub fn decode(dat: &[u8], offset: usize) -> Option<Self> {
        let header = GseHeader::decode(dat)?;
        let frame_len = header.frame_len();
        if dat.len() < frame_len {
            return None;
        }
        let dat = &dat[..frame_len];

        let mut frame = GseFrame {
            offset,
            header,
            frag_id: None,
            total_length: None,
            protocol_type: None,
            label: None,
            ext_header: None,
            payload: offset + GseHeader::LEN..offset + GseHeader::LEN,
            disposition: Payload::Opaque,
            crc32: None,
        };
        if header.is_padding() {
            trace!(offset, "gse padding");
            return Some(frame);
        }

        let mut cur = Cursor::new(&dat[GseHeader::LEN..]);
        if header.has_frag_id() {
            frame.frag_id = Some(cur.u8()?);
        }
        if header.has_total_length() {
            frame.total_length = Some(cur.u16()?);
        }
        if header.start {
            let protocol_type = cur.u16()?;
            frame.protocol_type = Some(protocol_type);
            frame.label = Some(match header.label_type {
                0 => Label::Mac(cur.take()?),
                1 => Label::Short(cur.take()?),
                2 => Label::Broadcast,
                _ => Label::ReUse,
            });
            if Self::EXT_HEADER_TYPES.contains(&protocol_type) {
                frame.ext_header = Some(cur.u8()?);
            }
        }

        let crc_len = if header.has_crc32() { 4 } else { 0 };
        let payload_len = cur.remaining().checked_sub(crc_len)?;
        let start = offset + GseHeader::LEN + cur.pos;
        frame.payload = start..start + payload_len;
        cur.skip(payload_len);

        if header.has_crc32() {
            frame.crc32 = Some(u32::from_be_bytes(cur.take()?));
        }

        trace!(offset, len = frame_len, kind = ?frame.kind(), "gse frame");
        Some(frame)
    }

    /// Total bytes occupied by this frame.
    #[must_use]
    pub fn len(&self) -> usize {
        self.header.frame_len()
    }

    #[must_use]
    pub fn kind(&self) -> FrameKind {
        match (self.header.start, self.header.stop) {
            _ if self.header.is_padding() => FrameKind::Padding,
            (true, true) => FrameKind::Complete,
            (true, false) => FrameKind::First,
            (false, false) => FrameKind::Continuation,
            (false, true) => FrameKind::Last,
        }
    }

    #[must_use]
    pub fn protocol_name(&self) -> Option<&'static str> {
        self.protocol_type.and_then(protocol_name)
    }

    /// The payload bytes of this frame from the buffer it was decoded from.
    #[must_use]
    pub fn payload_bytes<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        buf.get(self.payload.clone()).unwrap_or_default()
    }

    /// Hand the payload to the sink registered for its protocol type, if full dissection
    /// is enabled and this frame starts a PDU.
    pub fn dispatch(&mut self, buf: &[u8], opts: &DecodeOpts, sinks: &mut SinkRegistry) {
        if !opts.full_dissection || !self.header.start {
            return;
        }
        let Some(protocol_type) = self.protocol_type else {
            return;
        };
        self.disposition = sinks.dispatch(protocol_type, self.payload_bytes(buf));
    }
}

/// Big-endian reader over the bytes following a GSE header.
struct Cursor<'a> {
    dat: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(dat: &'a [u8]) -> Self {
        Cursor { dat, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.dat.len() - self.pos
    }

    fn skip(&mut self, num: usize) {
        self.pos += num;
    }

    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes: [u8; N] = self.dat.get(self.pos..self.pos + N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|b| b[0])
    }

    fn u16(&mut self) -> Option<u16> {
        self.take().map(u16::from_be_bytes)
    }
}
