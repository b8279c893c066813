//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use internet_checksum::Checksum;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::bytes_ext::{BufExt, BufMutExt};
use crate::error::{DecodeError, DecodeResult};

// OSPF Packet Type.
//
// IANA registry:
// https://www.iana.org/assignments/ospfv2-parameters/ospfv2-parameters.xhtml#ospfv2-parameters-3
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, Hash, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum PacketType {
    Hello = 0x01,
    DbDesc = 0x02,
    LsRequest = 0x03,
    LsUpdate = 0x04,
    LsAck = 0x05,
}

// OSPFv2 authentication type. Only Null is ever generated by this probe;
// Simple and Cryptographic are accepted on decode (the trailer is skipped,
// not validated) since the probe neither holds nor needs the keys.
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum AuthType {
    Null = 0x00,
    Simple = 0x01,
    Cryptographic = 0x02,
}

//
// OSPFv2 packet header.
//
// Encoding format:
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |   Version #   |     Type      |         Packet length         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                          Router ID                            |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                           Area ID                             |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |           Checksum            |             AuType            |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                       Authentication                          |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                       Authentication                          |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PacketHdr {
    pub pkt_type: PacketType,
    pub router_id: Ipv4Addr,
    pub area_id: Ipv4Addr,
    pub auth_type: AuthType,
}

impl PacketHdr {
    pub const VERSION: u8 = 2;
    pub const LENGTH: u16 = 24;
    pub const CKSUM_RANGE: std::ops::Range<usize> = 12..14;
    pub const AUTH_RANGE: std::ops::Range<usize> = 16..24;

    pub fn new(pkt_type: PacketType, router_id: Ipv4Addr, area_id: Ipv4Addr) -> Self {
        PacketHdr {
            pkt_type,
            router_id,
            area_id,
            auth_type: AuthType::Null,
        }
    }

    // Decodes the fixed 24-byte header, returning it along with the total
    // packet length carried in the header (used by the caller to bound the
    // body slice).
    pub fn decode(buf: &mut Bytes) -> DecodeResult<(Self, u16)> {
        let version = buf.try_get_u8()?;
        if version != Self::VERSION {
            return Err(DecodeError::InvalidVersion(version));
        }

        let pkt_type = buf.try_get_u8()?;
        let Some(pkt_type) = PacketType::from_u8(pkt_type) else {
            return Err(DecodeError::UnknownPacketType(pkt_type));
        };

        let pkt_len = buf.try_get_u16()?;
        if pkt_len < Self::LENGTH {
            return Err(DecodeError::InvalidLength(pkt_len));
        }

        let router_id = buf.try_get_ipv4()?;
        if !is_usable_router_id(router_id) {
            return Err(DecodeError::InvalidRouterId(router_id));
        }

        let area_id = buf.try_get_ipv4()?;

        // Checksum was already verified by the caller over the whole buffer.
        let _cksum = buf.try_get_u16()?;

        let au_type = buf.try_get_u16()?;
        let Some(auth_type) = AuthType::from_u16(au_type) else {
            return Err(DecodeError::UnsupportedAuthType(au_type));
        };
        // The 8-byte authentication trailer is never validated; skip it
        // whole regardless of the announced type.
        let _auth_data = buf.try_get_u64()?;

        Ok((
            PacketHdr {
                pkt_type,
                router_id,
                area_id,
                auth_type,
            },
            pkt_len,
        ))
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(Self::VERSION);
        buf.put_u8(self.pkt_type as u8);
        // Packet length is patched in once the body has been encoded.
        buf.put_u16(0);
        buf.put_ipv4(&self.router_id);
        buf.put_ipv4(&self.area_id);
        // Checksum is patched in by `update_cksum`.
        buf.put_u16(0);
        buf.put_u16(AuthType::Null as u16);
        buf.put_u64(0);
    }

    pub fn update_cksum(buf: &mut BytesMut) {
        let mut cksum = Checksum::new();
        cksum.add_bytes(&buf[0..Self::AUTH_RANGE.start]);
        cksum.add_bytes(&buf[Self::AUTH_RANGE.end..]);
        buf[Self::CKSUM_RANGE].copy_from_slice(&cksum.checksum());
    }

    pub fn verify_cksum(data: &[u8]) -> DecodeResult<()> {
        let mut cksum = Checksum::new();
        cksum.add_bytes(&data[0..Self::AUTH_RANGE.start]);
        cksum.add_bytes(&data[Self::AUTH_RANGE.end..]);
        if cksum.checksum() != [0; 2] {
            return Err(DecodeError::InvalidChecksum);
        }
        Ok(())
    }
}

fn is_usable_router_id(addr: Ipv4Addr) -> bool {
    !addr.is_unspecified() && !addr.is_broadcast() && !addr.is_multicast()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let hdr = PacketHdr::new(
            PacketType::Hello,
            Ipv4Addr::new(1, 1, 1, 1),
            Ipv4Addr::new(0, 0, 0, 0),
        );
        let mut buf = BytesMut::new();
        hdr.encode(&mut buf);
        buf[2..4].copy_from_slice(&(PacketHdr::LENGTH).to_be_bytes());
        PacketHdr::update_cksum(&mut buf);
        PacketHdr::verify_cksum(&buf).unwrap();

        let mut rbuf = buf.freeze();
        let (decoded, pkt_len) = PacketHdr::decode(&mut rbuf).unwrap();
        assert_eq!(decoded.pkt_type, PacketType::Hello);
        assert_eq!(decoded.router_id, hdr.router_id);
        assert_eq!(pkt_len, PacketHdr::LENGTH);
    }

    #[test]
    fn header_rejects_bad_version() {
        let hdr = PacketHdr::new(
            PacketType::Hello,
            Ipv4Addr::new(1, 1, 1, 1),
            Ipv4Addr::UNSPECIFIED,
        );
        let mut buf = BytesMut::new();
        hdr.encode(&mut buf);
        buf[0] = 3;
        let mut rbuf = buf.freeze();
        assert_eq!(PacketHdr::decode(&mut rbuf), Err(DecodeError::InvalidVersion(3)));
    }
}
