//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::bytes_ext::BufExt;
use crate::error::{DecodeError, DecodeResult};
use crate::header::PacketHdr;
use crate::lsa::Lsa;

//
// OSPFv2 Link State Update packet.
//
// Encoding format (packet body):
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                            # LSAs                             |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                             LSAs                              |
// |                              ...                              |
//
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LsUpdate {
    pub hdr: PacketHdr,
    pub lsas: Vec<Lsa>,
}

impl LsUpdate {
    pub const BASE_LENGTH: u16 = 4;

    pub fn decode(hdr: PacketHdr, buf: &mut Bytes) -> DecodeResult<Self> {
        if buf.remaining() < Self::BASE_LENGTH as usize {
            return Err(DecodeError::InvalidLength(buf.remaining() as u16));
        }
        let lsa_cnt = buf.try_get_u32()?;

        // `Lsa::decode` always advances `buf` by exactly the LSA's declared
        // length before it can fail on the body, so a per-LSA decode error
        // never desynchronizes the rest of the update -- except when the
        // length field itself is bogus, in which case there's no safe
        // resync point left and we stop short, returning what decoded
        // cleanly so far. Checksum failures are not decode errors at all;
        // those surface later via `Lsa::validate` so the caller can skip
        // just that LSA.
        let mut lsas = Vec::with_capacity(lsa_cnt as usize);
        for _ in 0..lsa_cnt {
            match Lsa::decode(buf) {
                Ok(lsa) => lsas.push(lsa),
                Err(_) => break,
            }
        }

        Ok(LsUpdate { hdr, lsas })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.lsas.len() as u32);
        for lsa in &self.lsas {
            buf.put_slice(&lsa.raw);
        }
    }
}
