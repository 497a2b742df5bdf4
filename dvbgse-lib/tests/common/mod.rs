#![allow(dead_code)]
use dvbgse::integrity::compute_crc8;

/// Baseband header with a valid CRC-8 declaring `payload_len` data field bytes.
pub fn bbheader(matype1: u8, payload_len: usize) -> Vec<u8> {
    let dfl = u16::try_from(payload_len * 8).expect("data field too large");
    let dfl = dfl.to_be_bytes();
    let mut dat = vec![matype1, 0x00, 0x00, 0x00, dfl[0], dfl[1], 0x00, 0x00, 0x00];
    dat.push(compute_crc8(&dat));
    dat
}

/// Unfragmented GSE frame with a broadcast label.
pub fn gse_complete(protocol_type: u16, payload: &[u8]) -> Vec<u8> {
    let length = 2 + payload.len() as u16;
    let mut dat = (0xe000 | length).to_be_bytes().to_vec();
    dat.extend(protocol_type.to_be_bytes());
    dat.extend(payload);
    dat
}

/// Mode adaptation header `ma` followed by a baseband frame whose data field is exactly the
/// concatenation of `gse`.
pub fn buffer(ma: &[u8], gse: &[Vec<u8>]) -> Vec<u8> {
    let data: Vec<u8> = gse.concat();
    let mut buf = ma.to_vec();
    buf.extend(bbheader(0x72, data.len()));
    buf.extend(data);
    buf
}
