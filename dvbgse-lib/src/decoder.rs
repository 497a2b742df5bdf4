#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    bbframe::BasebandFrame,
    error::Reason,
    gse::{ProtocolSink, SinkRegistry},
    modeadapt::ModeAdaptationHeader,
    Error, Result,
};

/// Decoding options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DecodeOpts {
    /// Hand GSE payloads to registered [ProtocolSink]s rather than only exposing them as
    /// opaque bytes.
    pub full_dissection: bool,
}

impl DecodeOpts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_full_dissection(mut self, enabled: bool) -> Self {
        self.full_dissection = enabled;
        self
    }
}

/// Everything decoded from a single buffer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Dissection {
    pub mode_adaptation: ModeAdaptationHeader,
    pub baseband: BasebandFrame,
}

impl Dissection {
    /// Total number of bytes consumed from the buffer.
    #[must_use]
    pub fn consumed(&self) -> usize {
        self.mode_adaptation.len() + self.baseband.len()
    }

    /// Returns `true` if GSE decoding stopped before the baseband data field was used up.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.baseband.truncation.is_some()
    }
}

/// Decode a mode adaptation header, the baseband frame following it, and the GSE frames in
/// the baseband data field from `buf`.
///
/// # Errors
/// [Error::NotRecognized] if `buf` does not look like a mode adaptation framed baseband
/// frame, in which case nothing is consumed.
pub fn decode(buf: &[u8], opts: &DecodeOpts, sinks: &mut SinkRegistry) -> Result<Dissection> {
    let mode_adaptation = ModeAdaptationHeader::decode(buf)?;
    let offset = mode_adaptation.len();
    // A recognized mode adaptation header is always followed by a full baseband header
    let baseband = BasebandFrame::decode(buf, offset, opts, sinks)
        .ok_or(Error::NotRecognized(Reason::NoValidBaseband))?;

    let dissection = Dissection {
        mode_adaptation,
        baseband,
    };
    debug!(
        len = buf.len(),
        consumed = dissection.consumed(),
        num_frames = dissection.baseband.frames.len(),
        truncated = dissection.is_truncated(),
        "decoded"
    );
    Ok(dissection)
}

/// Decodes buffers using a fixed set of options and protocol sinks.
///
/// # Examples
/// ```
/// use dvbgse::Decoder;
///
/// let mut decoder = Decoder::new();
/// let zult = decoder.decode(&[0x47, 0x00, 0x00]);
/// assert!(zult.is_err());
/// ```
#[derive(Debug, Default)]
pub struct Decoder {
    opts: DecodeOpts,
    sinks: SinkRegistry,
}

impl Decoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_opts(mut self, opts: DecodeOpts) -> Self {
        self.opts = opts;
        self
    }

    #[must_use]
    pub fn with_full_dissection(mut self, enabled: bool) -> Self {
        self.opts.full_dissection = enabled;
        self
    }

    /// Use `sink` for GSE payloads with `protocol_type`. Sinks are only used when full
    /// dissection is enabled.
    #[must_use]
    pub fn with_sink(mut self, protocol_type: u16, sink: Box<dyn ProtocolSink>) -> Self {
        self.sinks.register(protocol_type, sink);
        self
    }

    #[must_use]
    pub fn opts(&self) -> &DecodeOpts {
        &self.opts
    }

    /// See [decode].
    ///
    /// # Errors
    /// [Error::NotRecognized] if `buf` is not a mode adaptation framed baseband frame.
    pub fn decode(&mut self, buf: &[u8]) -> Result<Dissection> {
        decode(buf, &self.opts, &mut self.sinks)
    }
}
