use std::collections::HashMap;

use crossbeam::channel::Sender;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Payload;

/// GSE protocol type for IPv4
pub const PROTOCOL_IPV4: u16 = 0x0800;
/// GSE protocol type for IPv6
pub const PROTOCOL_IPV6: u16 = 0x86dd;

/// Consumer of recovered GSE payloads, e.g., an IPv4 or IPv6 decoder.
pub trait ProtocolSink {
    fn consume(&mut self, protocol_type: u16, payload: &[u8]);
}

/// A payload handed off to a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pdu {
    pub protocol_type: u16,
    #[cfg_attr(feature = "serde", serde(with = "serde_bytes"))]
    pub data: Vec<u8>,
}

/// Forwards payloads as [Pdu]s. Payloads are dropped once the receiver hangs up.
impl ProtocolSink for Sender<Pdu> {
    fn consume(&mut self, protocol_type: u16, payload: &[u8]) {
        let pdu = Pdu {
            protocol_type,
            data: payload.to_vec(),
        };
        if self.send(pdu).is_err() {
            debug!(protocol_type, "failed to send pdu");
        }
    }
}

/// Maps protocol types to the [ProtocolSink] that handles them. Payloads of protocol types
/// without a sink are left opaque.
///
/// # Examples
/// ```
/// use crossbeam::channel::unbounded;
/// use dvbgse::gse::{Payload, Pdu, SinkRegistry, PROTOCOL_IPV4, PROTOCOL_IPV6};
///
/// let (tx, rx) = unbounded::<Pdu>();
/// let mut sinks = SinkRegistry::default()
///     .with_sink(PROTOCOL_IPV4, Box::new(tx.clone()))
///     .with_sink(PROTOCOL_IPV6, Box::new(tx));
///
/// assert_eq!(sinks.dispatch(PROTOCOL_IPV4, &[0x45]), Payload::Dissected);
/// assert_eq!(sinks.dispatch(0x0806, &[0x00]), Payload::Opaque);
/// assert_eq!(rx.recv().unwrap().data, vec![0x45]);
/// ```
#[derive(Default)]
pub struct SinkRegistry {
    sinks: HashMap<u16, Box<dyn ProtocolSink>>,
}

impl SinkRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sink(mut self, protocol_type: u16, sink: Box<dyn ProtocolSink>) -> Self {
        self.register(protocol_type, sink);
        self
    }

    /// Register `sink` for `protocol_type`, replacing any existing sink.
    pub fn register(&mut self, protocol_type: u16, sink: Box<dyn ProtocolSink>) {
        self.sinks.insert(protocol_type, sink);
    }

    #[must_use]
    pub fn contains(&self, protocol_type: u16) -> bool {
        self.sinks.contains_key(&protocol_type)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Hand `payload` to the sink for `protocol_type`, if there is one.
    pub fn dispatch(&mut self, protocol_type: u16, payload: &[u8]) -> Payload {
        match self.sinks.get_mut(&protocol_type) {
            Some(sink) => {
                sink.consume(protocol_type, payload);
                Payload::Dissected
            }
            None => Payload::Opaque,
        }
    }
}

impl std::fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&u16> = self.sinks.keys().collect();
        types.sort();
        f.debug_struct("SinkRegistry")
            .field("protocol_types", &types)
            .finish()
    }
}
