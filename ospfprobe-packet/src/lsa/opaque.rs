//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use enum_as_inner::EnumAsInner;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::bytes_ext::{BufExt, BufMutExt};
use crate::error::DecodeResult;
use crate::tlv::{UnknownTlv, tlv_decode_hdr, tlv_encode_end, tlv_encode_start, tlv_skip_padding};

// The Opaque LSA Link State ID packs an 8-bit "opaque type" into its first
// octet and a 24-bit "opaque ID" into the rest (RFC 5250 SS3).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OpaqueLsaId {
    pub opaque_type: u8,
    pub opaque_id: u32,
}

impl From<Ipv4Addr> for OpaqueLsaId {
    fn from(lsa_id: Ipv4Addr) -> OpaqueLsaId {
        let octets = lsa_id.octets();
        let opaque_type = octets[0];
        let mut id_octets = octets;
        id_octets[0] = 0;
        OpaqueLsaId {
            opaque_type,
            opaque_id: u32::from_be_bytes(id_octets),
        }
    }
}

// IANA registry:
// https://www.iana.org/assignments/ospf-opaque-types/ospf-opaque-types.xhtml
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, PartialEq)]
pub enum LsaOpaqueType {
    TrafficEngineering = 1,
}

#[derive(Clone, Debug, EnumAsInner, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum LsaOpaque {
    TrafficEngineering(LsaTrafficEngineering),
    Unknown(LsaOpaqueUnknown),
}

/// Opaque LSA whose type this probe doesn't interpret. The raw body is
/// preserved verbatim so the LSDB query surface can still expose it.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LsaOpaqueUnknown {
    pub data: Bytes,
}

/// RFC 3630 Traffic Engineering LSA: a flat list of top-level TLVs, each
/// either a Router Address or a Link TLV (itself a list of sub-TLVs).
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LsaTrafficEngineering {
    pub tlvs: Vec<TeTlv>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum TeTlv {
    RouterAddress(Ipv4Addr),
    Link(TeLinkTlv),
    Unknown(UnknownTlv),
}

const TE_TLV_ROUTER_ADDRESS: u16 = 1;
const TE_TLV_LINK: u16 = 2;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct TeLinkTlv {
    pub link_type: Option<u8>,
    pub link_id: Option<Ipv4Addr>,
    pub local_if_addr: Vec<Ipv4Addr>,
    pub remote_if_addr: Vec<Ipv4Addr>,
    pub te_metric: Option<u32>,
    pub max_bandwidth: Option<u32>,
    pub max_reservable_bandwidth: Option<u32>,
    pub unreserved_bandwidth: Option<[u32; 8]>,
    pub admin_group: Option<u32>,
    // Any sub-TLV this probe doesn't parse, including vendor-proprietary
    // ones (e.g. Cisco's sub-pool / IGP-metric sub-TLVs), kept as raw
    // type+value pairs rather than guessed at.
    pub unknown: Vec<UnknownTlv>,
}

const LINK_SUBTLV_TYPE: u16 = 1;
const LINK_SUBTLV_ID: u16 = 2;
const LINK_SUBTLV_LOCAL_IF_ADDR: u16 = 3;
const LINK_SUBTLV_REMOTE_IF_ADDR: u16 = 4;
const LINK_SUBTLV_TE_METRIC: u16 = 5;
const LINK_SUBTLV_MAX_BW: u16 = 6;
const LINK_SUBTLV_MAX_RESV_BW: u16 = 7;
const LINK_SUBTLV_UNRESV_BW: u16 = 8;
const LINK_SUBTLV_ADMIN_GROUP: u16 = 9;

impl LsaOpaque {
    pub fn decode(lsa_id: Ipv4Addr, buf: &mut Bytes) -> DecodeResult<Self> {
        let opaque_id = OpaqueLsaId::from(lsa_id);
        let lsa = match LsaOpaqueType::from_u8(opaque_id.opaque_type) {
            Some(LsaOpaqueType::TrafficEngineering) => {
                LsaOpaque::TrafficEngineering(LsaTrafficEngineering::decode(buf)?)
            }
            None => LsaOpaque::Unknown(LsaOpaqueUnknown {
                data: buf.copy_to_bytes(buf.remaining()),
            }),
        };
        Ok(lsa)
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            LsaOpaque::TrafficEngineering(lsa) => lsa.encode(buf),
            LsaOpaque::Unknown(lsa) => buf.put_slice(&lsa.data),
        }
    }
}

impl LsaTrafficEngineering {
    pub fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        let mut tlvs = vec![];
        while let Some((tlv_type, tlv_len)) = tlv_decode_hdr(buf)? {
            if buf.remaining() < tlv_len as usize {
                break;
            }
            let mut tlv_buf = buf.copy_to_bytes(tlv_len as usize);
            tlv_skip_padding(buf, tlv_len);

            let tlv = match tlv_type {
                TE_TLV_ROUTER_ADDRESS if tlv_len == 4 => {
                    TeTlv::RouterAddress(tlv_buf.try_get_ipv4()?)
                }
                TE_TLV_LINK => TeTlv::Link(TeLinkTlv::decode(&mut tlv_buf)?),
                _ => TeTlv::Unknown(UnknownTlv {
                    tlv_type,
                    value: tlv_buf,
                }),
            };
            tlvs.push(tlv);
        }
        Ok(LsaTrafficEngineering { tlvs })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        for tlv in &self.tlvs {
            match tlv {
                TeTlv::RouterAddress(addr) => {
                    let start = tlv_encode_start(buf, TE_TLV_ROUTER_ADDRESS);
                    buf.put_ipv4(addr);
                    tlv_encode_end(buf, start);
                }
                TeTlv::Link(link) => {
                    let start = tlv_encode_start(buf, TE_TLV_LINK);
                    link.encode(buf);
                    tlv_encode_end(buf, start);
                }
                TeTlv::Unknown(unknown) => unknown.encode(buf),
            }
        }
    }
}

impl TeLinkTlv {
    fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        let mut link = TeLinkTlv::default();
        while let Some((sub_type, sub_len)) = tlv_decode_hdr(buf)? {
            if buf.remaining() < sub_len as usize {
                break;
            }
            let mut sub_buf = buf.copy_to_bytes(sub_len as usize);
            tlv_skip_padding(buf, sub_len);

            match sub_type {
                LINK_SUBTLV_TYPE if sub_len >= 1 => {
                    link.link_type = Some(sub_buf.try_get_u8()?);
                }
                LINK_SUBTLV_ID if sub_len == 4 => {
                    link.link_id = Some(sub_buf.try_get_ipv4()?);
                }
                LINK_SUBTLV_LOCAL_IF_ADDR => {
                    while sub_buf.remaining() >= 4 {
                        link.local_if_addr.push(sub_buf.try_get_ipv4()?);
                    }
                }
                LINK_SUBTLV_REMOTE_IF_ADDR => {
                    while sub_buf.remaining() >= 4 {
                        link.remote_if_addr.push(sub_buf.try_get_ipv4()?);
                    }
                }
                LINK_SUBTLV_TE_METRIC if sub_len == 4 => {
                    link.te_metric = Some(sub_buf.try_get_u32()?);
                }
                LINK_SUBTLV_MAX_BW if sub_len == 4 => {
                    link.max_bandwidth = Some(sub_buf.try_get_u32()?);
                }
                LINK_SUBTLV_MAX_RESV_BW if sub_len == 4 => {
                    link.max_reservable_bandwidth = Some(sub_buf.try_get_u32()?);
                }
                LINK_SUBTLV_UNRESV_BW if sub_len == 32 => {
                    let mut priorities = [0u32; 8];
                    for p in &mut priorities {
                        *p = sub_buf.try_get_u32()?;
                    }
                    link.unreserved_bandwidth = Some(priorities);
                }
                LINK_SUBTLV_ADMIN_GROUP if sub_len == 4 => {
                    link.admin_group = Some(sub_buf.try_get_u32()?);
                }
                _ => link.unknown.push(UnknownTlv {
                    tlv_type: sub_type,
                    value: sub_buf,
                }),
            }
        }
        Ok(link)
    }

    fn encode(&self, buf: &mut BytesMut) {
        if let Some(link_type) = self.link_type {
            let start = tlv_encode_start(buf, LINK_SUBTLV_TYPE);
            buf.put_u8(link_type);
            tlv_encode_end(buf, start);
        }
        if let Some(link_id) = self.link_id {
            let start = tlv_encode_start(buf, LINK_SUBTLV_ID);
            buf.put_ipv4(&link_id);
            tlv_encode_end(buf, start);
        }
        if !self.local_if_addr.is_empty() {
            let start = tlv_encode_start(buf, LINK_SUBTLV_LOCAL_IF_ADDR);
            for addr in &self.local_if_addr {
                buf.put_ipv4(addr);
            }
            tlv_encode_end(buf, start);
        }
        if !self.remote_if_addr.is_empty() {
            let start = tlv_encode_start(buf, LINK_SUBTLV_REMOTE_IF_ADDR);
            for addr in &self.remote_if_addr {
                buf.put_ipv4(addr);
            }
            tlv_encode_end(buf, start);
        }
        if let Some(metric) = self.te_metric {
            let start = tlv_encode_start(buf, LINK_SUBTLV_TE_METRIC);
            buf.put_u32(metric);
            tlv_encode_end(buf, start);
        }
        if let Some(bw) = self.max_bandwidth {
            let start = tlv_encode_start(buf, LINK_SUBTLV_MAX_BW);
            buf.put_u32(bw);
            tlv_encode_end(buf, start);
        }
        if let Some(bw) = self.max_reservable_bandwidth {
            let start = tlv_encode_start(buf, LINK_SUBTLV_MAX_RESV_BW);
            buf.put_u32(bw);
            tlv_encode_end(buf, start);
        }
        if let Some(priorities) = self.unreserved_bandwidth {
            let start = tlv_encode_start(buf, LINK_SUBTLV_UNRESV_BW);
            for bw in priorities {
                buf.put_u32(bw);
            }
            tlv_encode_end(buf, start);
        }
        if let Some(group) = self.admin_group {
            let start = tlv_encode_start(buf, LINK_SUBTLV_ADMIN_GROUP);
            buf.put_u32(group);
            tlv_encode_end(buf, start);
        }
        for unknown in &self.unknown {
            unknown.encode(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn te_link_tlv_round_trip() {
        let link = TeLinkTlv {
            link_type: Some(1),
            link_id: Some(Ipv4Addr::new(10, 0, 0, 1)),
            local_if_addr: vec![Ipv4Addr::new(10, 0, 0, 2)],
            remote_if_addr: vec![Ipv4Addr::new(10, 0, 0, 3)],
            te_metric: Some(10),
            max_bandwidth: Some(125_000_000),
            max_reservable_bandwidth: Some(125_000_000),
            unreserved_bandwidth: Some([125_000_000; 8]),
            admin_group: Some(0),
            unknown: vec![],
        };
        let te = LsaTrafficEngineering {
            tlvs: vec![
                TeTlv::RouterAddress(Ipv4Addr::new(1, 1, 1, 1)),
                TeTlv::Link(link),
            ],
        };

        let mut buf = BytesMut::new();
        te.encode(&mut buf);
        let mut rbuf = buf.freeze();
        let decoded = LsaTrafficEngineering::decode(&mut rbuf).unwrap();
        assert_eq!(decoded, te);
    }
}
