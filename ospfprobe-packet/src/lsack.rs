//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use bytes::{Buf, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::DecodeResult;
use crate::header::PacketHdr;
use crate::lsa::LsaHdr;

//
// OSPFv2 Link State Acknowledgment packet.
//
// Encoding format (packet body):
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                          LSA Header                           |
// |                              ...                              |
//
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LsAck {
    pub hdr: PacketHdr,
    pub lsa_hdrs: Vec<LsaHdr>,
}

impl LsAck {
    pub fn decode(hdr: PacketHdr, buf: &mut Bytes) -> DecodeResult<Self> {
        let mut lsa_hdrs = vec![];
        while buf.remaining() >= LsaHdr::LENGTH as usize {
            lsa_hdrs.push(LsaHdr::decode(buf)?);
        }
        Ok(LsAck { hdr, lsa_hdrs })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        for lsa_hdr in &self.lsa_hdrs {
            lsa_hdr.encode(buf);
        }
    }
}
