//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::bytes_ext::BufExt;
use crate::error::DecodeResult;

/// Size of a TLV/sub-TLV header (2-byte type + 2-byte length), common to
/// every OSPF opaque-LSA TLV format this crate decodes.
pub const TLV_HDR_SIZE: u16 = 4;

/// An unrecognized TLV or sub-TLV, kept verbatim so an unfamiliar opaque
/// payload still round-trips byte for byte instead of being dropped.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct UnknownTlv {
    pub tlv_type: u16,
    pub value: Bytes,
}

impl UnknownTlv {
    pub fn encode(&self, buf: &mut BytesMut) {
        let start = tlv_encode_start(buf, self.tlv_type);
        buf.put_slice(&self.value);
        tlv_encode_end(buf, start);
    }
}

// Encodes a TLV header with a placeholder length, returning the buffer
// offset where that length needs to be patched in once the value has been
// written (mirrors the packet/LSA "reserve, fill, patch" pattern).
pub fn tlv_encode_start(buf: &mut BytesMut, tlv_type: u16) -> usize {
    buf.put_u16(tlv_type);
    buf.put_u16(0);
    buf.len()
}

pub fn tlv_encode_end(buf: &mut BytesMut, start: usize) {
    let len = (buf.len() - start) as u16;
    buf[start - 2..start].copy_from_slice(&len.to_be_bytes());
    // Pad to a 4-byte boundary.
    let pad = (4 - (buf.len() % 4)) % 4;
    buf.put_bytes(0, pad);
}

/// Reads one TLV header (type, length) without consuming the value,
/// returning `None` once fewer than [`TLV_HDR_SIZE`] bytes remain.
pub fn tlv_decode_hdr(buf: &mut Bytes) -> DecodeResult<Option<(u16, u16)>> {
    if buf.remaining() < TLV_HDR_SIZE as usize {
        return Ok(None);
    }
    let tlv_type = buf.try_get_u16()?;
    let tlv_len = buf.try_get_u16()?;
    Ok(Some((tlv_type, tlv_len)))
}

/// Consumes the padding bytes following a TLV value so the next header
/// starts on a 4-byte boundary, per RFC 3630's TLV alignment rule.
pub fn tlv_skip_padding(buf: &mut Bytes, tlv_len: u16) {
    let pad = (4 - (tlv_len % 4)) % 4;
    buf.advance(pad as usize);
}
