//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cell::RefCell;
use std::net::Ipv4Addr;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::dbdesc::DbDesc;
use crate::error::{DecodeError, DecodeResult};
use crate::header::{PacketHdr, PacketType};
use crate::hello::Hello;
use crate::lsack::LsAck;
use crate::lsrequest::LsRequest;
use crate::lsupdate::LsUpdate;

thread_local! {
    // Scratch buffer reused across encode calls on the same task to avoid
    // a fresh heap allocation for every outgoing packet.
    static TLS_BUF: RefCell<BytesMut> = RefCell::new(BytesMut::new());
}

/// A fully decoded OSPFv2 packet of any of the five PDU types.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Packet {
    Hello(Hello),
    DbDesc(DbDesc),
    LsRequest(LsRequest),
    LsUpdate(LsUpdate),
    LsAck(LsAck),
}

impl Packet {
    pub fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        if buf.len() < PacketHdr::LENGTH as usize {
            return Err(DecodeError::InvalidLength(buf.len() as u16));
        }

        let buf_orig = buf.clone();
        let (hdr, pkt_len) = PacketHdr::decode(buf)?;

        if (pkt_len as usize) > buf_orig.len() {
            return Err(DecodeError::InvalidLength(pkt_len));
        }

        PacketHdr::verify_cksum(&buf_orig[0..pkt_len as usize])?;

        let min_body_len = match hdr.pkt_type {
            PacketType::Hello => Hello::BASE_LENGTH,
            PacketType::DbDesc => DbDesc::BASE_LENGTH,
            PacketType::LsRequest => 0,
            PacketType::LsUpdate => LsUpdate::BASE_LENGTH,
            PacketType::LsAck => 0,
        };
        if pkt_len < PacketHdr::LENGTH + min_body_len {
            return Err(DecodeError::InvalidLength(pkt_len));
        }

        let mut body = buf.split_to(pkt_len as usize - PacketHdr::LENGTH as usize);
        let packet = match hdr.pkt_type {
            PacketType::Hello => Packet::Hello(Hello::decode(hdr, &mut body)?),
            PacketType::DbDesc => Packet::DbDesc(DbDesc::decode(hdr, &mut body)?),
            PacketType::LsRequest => Packet::LsRequest(LsRequest::decode(hdr, &mut body)?),
            PacketType::LsUpdate => Packet::LsUpdate(LsUpdate::decode(hdr, &mut body)?),
            PacketType::LsAck => Packet::LsAck(LsAck::decode(hdr, &mut body)?),
        };

        Ok(packet)
    }

    pub fn encode(&self) -> Bytes {
        TLS_BUF.with(|buf| {
            let mut buf = buf.borrow_mut();
            buf.clear();

            self.hdr().encode(&mut buf);
            match self {
                Packet::Hello(pkt) => pkt.encode(&mut buf),
                Packet::DbDesc(pkt) => pkt.encode(&mut buf),
                Packet::LsRequest(pkt) => pkt.encode(&mut buf),
                Packet::LsUpdate(pkt) => pkt.encode(&mut buf),
                Packet::LsAck(pkt) => pkt.encode(&mut buf),
            }

            let pkt_len = buf.len() as u16;
            buf[2..4].copy_from_slice(&pkt_len.to_be_bytes());
            PacketHdr::update_cksum(&mut buf);

            buf.clone().freeze()
        })
    }

    pub fn hdr(&self) -> &PacketHdr {
        match self {
            Packet::Hello(pkt) => &pkt.hdr,
            Packet::DbDesc(pkt) => &pkt.hdr,
            Packet::LsRequest(pkt) => &pkt.hdr,
            Packet::LsUpdate(pkt) => &pkt.hdr,
            Packet::LsAck(pkt) => &pkt.hdr,
        }
    }

    pub fn pkt_type(&self) -> PacketType {
        self.hdr().pkt_type
    }

    pub fn router_id(&self) -> Ipv4Addr {
        self.hdr().router_id
    }

    pub fn area_id(&self) -> Ipv4Addr {
        self.hdr().area_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;

    #[test]
    fn hello_packet_round_trip() {
        let hdr = PacketHdr::new(
            PacketType::Hello,
            Ipv4Addr::new(1, 1, 1, 1),
            Ipv4Addr::new(0, 0, 0, 1),
        );
        let hello = Hello {
            hdr,
            network_mask: Ipv4Addr::new(255, 255, 255, 0),
            hello_interval: 10,
            options: Options::E,
            priority: 1,
            dead_interval: 40,
            dr: Some(Ipv4Addr::new(10, 0, 0, 1)),
            bdr: None,
            neighbors: Default::default(),
        };
        let packet = Packet::Hello(hello);

        let mut encoded = packet.encode();
        let decoded = Packet::decode(&mut encoded).unwrap();
        assert_eq!(decoded, packet);
    }
}
