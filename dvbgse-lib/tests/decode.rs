mod common;

use common::{bbheader, buffer, gse_complete};
use crossbeam::channel::unbounded;
use dvbgse::{
    gse::{FrameKind, Label, Payload, Pdu, SinkRegistry, PROTOCOL_IPV4, PROTOCOL_IPV6},
    decode, DecodeOpts, Decoder, Error, Reason,
};

fn decode_default(buf: &[u8]) -> dvbgse::Result<dvbgse::Dissection> {
    decode(buf, &DecodeOpts::default(), &mut SinkRegistry::default())
}

#[test]
fn single_ipv4_frame() {
    let buf = hex::decode("b8006000000000200000002ae0020800").unwrap();

    let dissection = decode_default(&buf).unwrap();

    assert_eq!(dissection.mode_adaptation.len(), 2);
    let bb = &dissection.baseband;
    assert!(bb.crc_valid);
    assert_eq!(bb.header.gs, 1);
    assert!(bb.header.mis_sis);
    assert_eq!(bb.header.payload_len(), 4);
    assert_eq!(bb.frames.len(), 1);

    let frame = &bb.frames[0];
    assert_eq!(frame.len(), 4);
    assert_eq!(frame.kind(), FrameKind::Complete);
    assert_eq!(frame.protocol_type, Some(PROTOCOL_IPV4));
    assert_eq!(frame.protocol_name(), Some("IPv4"));
    assert_eq!(frame.label, Some(Label::Broadcast));
    assert!(frame.payload.is_empty());
    assert_eq!(frame.crc32, None);
    assert_eq!(frame.disposition, Payload::Opaque);

    assert_eq!(bb.truncation, None);
    assert_eq!(dissection.consumed(), buf.len());
}

#[test]
fn gse_frame_longer_than_data_field() {
    // GSE length 4 requires 6 bytes, but the data field is only 2
    let buf = hex::decode("b8006000000000100000000de0040800").unwrap();

    let dissection = decode_default(&buf).unwrap();

    assert_eq!(dissection.mode_adaptation.len(), 2);
    assert_eq!(dissection.baseband.header.payload_len(), 2);
    assert!(dissection.baseband.frames.is_empty());
    let truncation = dissection.baseband.truncation.unwrap();
    assert_eq!(truncation.declared, 6);
    assert_eq!(truncation.remaining, 2);
    assert_eq!(dissection.baseband.trailing, 12..14);
    assert_eq!(dissection.consumed(), 12);
}

#[test]
fn well_formed_buffer_is_fully_consumed() {
    #[rustfmt::skip]
    let gse = vec![
        gse_complete(PROTOCOL_IPV4, &[0x45, 0x00, 0x00, 0x14]),
        vec![0x00, 0x00],
        // first fragment, 6 byte label
        vec![0x80, 0x0f, 0x01, 0x00, 0x20, 0x86, 0xdd, 1, 2, 3, 4, 5, 6, 0x60, 0x00, 0x00, 0x00],
        // last fragment
        vec![0x40, 0x07, 0x01, 0xaa, 0xbb, 0x01, 0x02, 0x03, 0x04],
    ];
    let buf = buffer(&[0xb8, 0x04], &gse);

    let dissection = decode_default(&buf).unwrap();

    assert_eq!(dissection.consumed(), buf.len());
    assert!(!dissection.is_truncated());
    assert!(dissection.baseband.trailing.is_empty());

    let kinds: Vec<FrameKind> = dissection.baseband.frames.iter().map(|f| f.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            FrameKind::Complete,
            FrameKind::Padding,
            FrameKind::First,
            FrameKind::Last
        ]
    );

    let first = &dissection.baseband.frames[2];
    assert_eq!(first.frag_id, Some(1));
    assert_eq!(first.total_length, Some(0x20));
    assert_eq!(first.label, Some(Label::Mac([1, 2, 3, 4, 5, 6])));
    assert_eq!(first.payload_bytes(&buf), &[0x60, 0x00, 0x00, 0x00]);

    let last = &dissection.baseband.frames[3];
    assert_eq!(last.frag_id, Some(1));
    assert_eq!(last.payload_bytes(&buf), &[0xaa, 0xbb]);
    assert_eq!(last.crc32, Some(0x0102_0304));
}

#[test]
fn decode_is_idempotent() {
    let buf = buffer(
        &[0xb8, 0x00],
        &[gse_complete(PROTOCOL_IPV6, &[0x60; 40]), vec![0x00, 0x00]],
    );
    let mut decoder = Decoder::new();

    let first = decoder.decode(&buf).unwrap();
    let second = decoder.decode(&buf).unwrap();

    assert_eq!(first, second);
}

#[test]
fn empty_buffer_is_not_recognized() {
    let err = decode_default(&[]).unwrap_err();
    assert!(matches!(err, Error::NotRecognized(Reason::Empty)));
    assert_eq!(err.consumed(), 0);
}

#[test]
fn bad_sync_is_not_recognized() {
    let mut buf = buffer(&[0xb8, 0x00], &[vec![0x00, 0x00]]);
    buf[0] = 0x47;

    let err = decode_default(&buf).unwrap_err();
    assert!(matches!(err, Error::NotRecognized(Reason::SyncByte(0x47))));
    assert!(err.is_not_recognized());
    assert_eq!(err.consumed(), 0);
}

#[test]
fn both_crc_trials_fail() {
    let mut buf = vec![0xb8, 0x00, 0x00, 0x00];
    let mut bb = bbheader(0x72, 4);
    bb[9] ^= 0x5a;
    buf.extend(bb);
    buf.extend([0x00, 0x00, 0x00, 0x00]);

    let err = decode_default(&buf).unwrap_err();
    assert!(matches!(err, Error::NotRecognized(Reason::NoValidBaseband)));
    assert_eq!(err.consumed(), 0);
}

#[test]
fn header_only_buffer_decodes() {
    let mut buf = vec![0xb8, 0x00];
    buf.extend(bbheader(0x72, 0));

    let dissection = decode_default(&buf).unwrap();

    assert!(dissection.baseband.crc_valid);
    assert!(dissection.baseband.frames.is_empty());
    assert!(!dissection.is_truncated());
    assert!(dissection.baseband.trailing.is_empty());
    assert_eq!(dissection.consumed(), 12);
}

#[test]
fn short_buffer_after_sync_is_not_recognized() {
    let mut buf = vec![0xb8, 0x00];
    buf.extend(&bbheader(0x72, 0)[..9]);

    let err = decode_default(&buf).unwrap_err();
    assert!(matches!(err, Error::NotRecognized(Reason::NoValidBaseband)));
}

#[test]
fn long_mode_adaptation_header() {
    let buf = buffer(&[0xb8, 0x2b, 0x11, 0x22], &[gse_complete(0x0806, &[0; 28])]);

    let dissection = decode_default(&buf).unwrap();

    let ma = &dissection.mode_adaptation;
    assert_eq!(ma.len(), 4);
    assert!(ma.pilot);
    assert_eq!(ma.modcod, 11);
    assert_eq!(ma.cni, Some(0x11));
    assert_eq!(ma.frame_number, Some(0x22));
    assert_eq!(dissection.baseband.offset, 4);
    assert_eq!(dissection.baseband.frames[0].protocol_name(), Some("ARP"));
    assert_eq!(dissection.consumed(), buf.len());
}

#[test]
fn padding_ignores_length_field() {
    let buf = buffer(&[0xb8, 0x00], &[vec![0x0f, 0xff], vec![0x00, 0x05]]);

    let dissection = decode_default(&buf).unwrap();

    let frames = &dissection.baseband.frames;
    assert_eq!(frames.len(), 2);
    assert!(frames.iter().all(|f| f.kind() == FrameKind::Padding && f.len() == 2));
    assert_eq!(dissection.consumed(), buf.len());
}

#[test]
fn max_length_with_one_byte_left() {
    let mut buf = vec![0xb8, 0x00];
    buf.extend(bbheader(0x72, 1));
    buf.extend([0x8f, 0xff]);

    let dissection = decode_default(&buf).unwrap();

    assert!(dissection.baseband.frames.is_empty());
    let truncation = dissection.baseband.truncation.unwrap();
    assert_eq!(truncation.declared, 4097);
    assert_eq!(truncation.remaining, 1);
    assert_eq!(dissection.consumed(), 12);
}

#[test]
fn full_dissection_hands_off_ip() {
    let (tx, rx) = unbounded::<Pdu>();
    let mut decoder = Decoder::new()
        .with_full_dissection(true)
        .with_sink(PROTOCOL_IPV4, Box::new(tx.clone()))
        .with_sink(PROTOCOL_IPV6, Box::new(tx));
    let buf = buffer(
        &[0xb8, 0x00],
        &[
            gse_complete(PROTOCOL_IPV4, &[0x45, 0x01]),
            gse_complete(0x0806, &[0x00, 0x01]),
            gse_complete(PROTOCOL_IPV6, &[0x60, 0x02]),
            // continuation of an IPv4 PDU is never handed off
            vec![0x30, 0x03, 0x09, 0x45, 0x03],
        ],
    );

    let dissection = decoder.decode(&buf).unwrap();
    drop(decoder);

    let dispositions: Vec<Payload> = dissection
        .baseband
        .frames
        .iter()
        .map(|f| f.disposition)
        .collect();
    assert_eq!(
        dispositions,
        vec![
            Payload::Dissected,
            Payload::Opaque,
            Payload::Dissected,
            Payload::Opaque
        ]
    );

    let pdus: Vec<Pdu> = rx.iter().collect();
    assert_eq!(
        pdus,
        vec![
            Pdu {
                protocol_type: PROTOCOL_IPV4,
                data: vec![0x45, 0x01]
            },
            Pdu {
                protocol_type: PROTOCOL_IPV6,
                data: vec![0x60, 0x02]
            },
        ]
    );
}

#[test]
fn sinks_unused_without_full_dissection() {
    let (tx, rx) = unbounded::<Pdu>();
    let mut decoder = Decoder::new().with_sink(PROTOCOL_IPV4, Box::new(tx));
    let buf = buffer(&[0xb8, 0x00], &[gse_complete(PROTOCOL_IPV4, &[0x45])]);

    let dissection = decoder.decode(&buf).unwrap();
    drop(decoder);

    assert_eq!(dissection.baseband.frames[0].disposition, Payload::Opaque);
    assert_eq!(rx.iter().count(), 0);
}
