//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod external;
pub mod network;
pub mod opaque;
pub mod router;
pub mod summary;

use std::net::Ipv4Addr;
use std::time::Instant;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use derive_new::new;
use enum_as_inner::EnumAsInner;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::bytes_ext::{BufExt, BufMutExt};
use crate::error::{DecodeError, DecodeResult, LsaValidationError};
pub use crate::lsa::external::LsaExternal;
pub use crate::lsa::network::LsaNetwork;
pub use crate::lsa::opaque::LsaOpaque;
pub use crate::lsa::router::{LsaRouter, LsaRouterFlags, LsaRouterLink, LsaRouterLinkType};
pub use crate::lsa::summary::LsaSummary;
use crate::options::Options;

/// Maximum LSA age (seconds) before the LSA is purged from the database.
pub const LSA_MAX_AGE: u16 = 3600;
/// Minimum separation, in seconds, between otherwise-equal LSA instances
/// before they're considered distinguishable by age alone (RFC 2328 §13.1).
pub const LSA_MIN_AGE_DIFF: u16 = 900;
/// Minimum time between accepted instances of the same LSA (RFC 2328 §13.2).
pub const LSA_MIN_ARRIVAL: u16 = 1;
pub const LSA_INIT_SEQ_NO: u32 = 0x8000_0001;
pub const LSA_MAX_SEQ_NO: u32 = 0x7fff_ffff;
pub const LSA_RESERVED_SEQ_NO: u32 = 0x8000_0000;

// OSPFv2 LSA type. Kept as a raw newtype (rather than a closed enum) so
// unrecognized types still round-trip as `LsaBody::Unknown`.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct LsaType(pub u8);

// IANA registry:
// https://www.iana.org/assignments/ospfv2-parameters/ospfv2-parameters.xhtml#ospfv2-parameters-5
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum LsaTypeCode {
    Router = 1,
    Network = 2,
    SummaryNetwork = 3,
    SummaryRouter = 4,
    AsExternal = 5,
    Nssa = 7,
    OpaqueLink = 9,
    OpaqueArea = 10,
    OpaqueAs = 11,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum LsaScope {
    Link,
    Area,
    As,
    Unknown,
}

impl LsaType {
    pub fn type_code(&self) -> Option<LsaTypeCode> {
        LsaTypeCode::from_u8(self.0)
    }

    pub fn is_opaque(&self) -> bool {
        matches!(
            self.type_code(),
            Some(LsaTypeCode::OpaqueLink | LsaTypeCode::OpaqueArea | LsaTypeCode::OpaqueAs)
        )
    }

    pub fn scope(&self) -> LsaScope {
        match self.type_code() {
            Some(LsaTypeCode::OpaqueLink) => LsaScope::Link,
            Some(
                LsaTypeCode::Router
                | LsaTypeCode::Network
                | LsaTypeCode::SummaryNetwork
                | LsaTypeCode::SummaryRouter
                | LsaTypeCode::OpaqueArea,
            ) => LsaScope::Area,
            Some(LsaTypeCode::AsExternal | LsaTypeCode::Nssa | LsaTypeCode::OpaqueAs) => {
                LsaScope::As
            }
            None => LsaScope::Unknown,
        }
    }
}

impl std::fmt::Display for LsaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<LsaTypeCode> for LsaType {
    fn from(code: LsaTypeCode) -> LsaType {
        LsaType(code as u8)
    }
}

impl From<LsaType> for u16 {
    fn from(lsa_type: LsaType) -> u16 {
        lsa_type.0.into()
    }
}

// OSPF LSA key: uniquely identifies an LSA instance within an LSDB
// regardless of its sequence number.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, new)]
#[derive(Deserialize, Serialize)]
pub struct LsaKey {
    pub lsa_type: LsaType,
    pub adv_rtr: Ipv4Addr,
    pub lsa_id: Ipv4Addr,
}

//
// OSPFv2 LSA header.
//
// Encoding format:
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |            LS age             |    Options    |    LS type    |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                        Link State ID                          |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                     Advertising Router                        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                     LS sequence number                        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |         LS checksum           |             length            |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LsaHdr {
    pub age: u16,
    pub options: Options,
    pub lsa_type: LsaType,
    pub lsa_id: Ipv4Addr,
    pub adv_rtr: Ipv4Addr,
    pub seq_no: u32,
    pub cksum: u16,
    pub length: u16,
}

impl LsaHdr {
    pub const LENGTH: u16 = 20;

    pub fn key(&self) -> LsaKey {
        LsaKey::new(self.lsa_type, self.adv_rtr, self.lsa_id)
    }

    pub fn is_maxage(&self) -> bool {
        self.age == LSA_MAX_AGE
    }

    pub fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        if buf.remaining() < Self::LENGTH as usize {
            return Err(DecodeError::InvalidLength(buf.remaining() as u16));
        }
        let age = buf.get_u16();
        let options = Options::from_bits_truncate(buf.get_u8());
        let lsa_type = LsaType(buf.get_u8());
        let lsa_id = buf.try_get_ipv4()?;
        let adv_rtr = buf.try_get_ipv4()?;
        let seq_no = buf.get_u32();
        let cksum = buf.get_u16();
        let length = buf.get_u16();

        Ok(LsaHdr {
            age,
            options,
            lsa_type,
            lsa_id,
            adv_rtr,
            seq_no,
            cksum,
            length,
        })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.age);
        buf.put_u8(self.options.bits());
        buf.put_u8(self.lsa_type.0);
        buf.put_ipv4(&self.lsa_id);
        buf.put_ipv4(&self.adv_rtr);
        buf.put_u32(self.seq_no);
        buf.put_u16(self.cksum);
        buf.put_u16(self.length);
    }
}

// OSPF LSA body, dispatched by `LsaTypeCode`. The probe never originates any
// of these (it only ever relays the exact bytes it received), but it still
// needs to decode each one to maintain the LSDB and answer queries.
#[derive(Clone, Debug, EnumAsInner, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum LsaBody {
    Router(LsaRouter),
    Network(LsaNetwork),
    SummaryNetwork(LsaSummary),
    SummaryRouter(LsaSummary),
    AsExternal(LsaExternal),
    Nssa(LsaExternal),
    OpaqueLink(LsaOpaque),
    OpaqueArea(LsaOpaque),
    OpaqueAs(LsaOpaque),
    Unknown(LsaUnknown),
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LsaUnknown {}

impl LsaBody {
    pub fn decode(lsa_type: LsaType, lsa_id: Ipv4Addr, buf: &mut Bytes) -> DecodeResult<Self> {
        let body = match lsa_type.type_code() {
            Some(LsaTypeCode::Router) => LsaBody::Router(LsaRouter::decode(buf)?),
            Some(LsaTypeCode::Network) => LsaBody::Network(LsaNetwork::decode(buf)?),
            Some(LsaTypeCode::SummaryNetwork) => LsaBody::SummaryNetwork(LsaSummary::decode(buf)?),
            Some(LsaTypeCode::SummaryRouter) => LsaBody::SummaryRouter(LsaSummary::decode(buf)?),
            Some(LsaTypeCode::AsExternal) => LsaBody::AsExternal(LsaExternal::decode(buf)?),
            Some(LsaTypeCode::Nssa) => LsaBody::Nssa(LsaExternal::decode(buf)?),
            Some(LsaTypeCode::OpaqueLink) => LsaBody::OpaqueLink(LsaOpaque::decode(lsa_id, buf)?),
            Some(LsaTypeCode::OpaqueArea) => LsaBody::OpaqueArea(LsaOpaque::decode(lsa_id, buf)?),
            Some(LsaTypeCode::OpaqueAs) => LsaBody::OpaqueAs(LsaOpaque::decode(lsa_id, buf)?),
            None => LsaBody::Unknown(LsaUnknown {}),
        };
        Ok(body)
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            LsaBody::Router(lsa) => lsa.encode(buf),
            LsaBody::Network(lsa) => lsa.encode(buf),
            LsaBody::SummaryNetwork(lsa) => lsa.encode(buf),
            LsaBody::SummaryRouter(lsa) => lsa.encode(buf),
            LsaBody::AsExternal(lsa) => lsa.encode(buf),
            LsaBody::Nssa(lsa) => lsa.encode(buf),
            LsaBody::OpaqueLink(lsa) => lsa.encode(buf),
            LsaBody::OpaqueArea(lsa) => lsa.encode(buf),
            LsaBody::OpaqueAs(lsa) => lsa.encode(buf),
            LsaBody::Unknown(_) => {}
        }
    }

    pub fn lsa_type(&self) -> LsaType {
        match self {
            LsaBody::Router(_) => LsaTypeCode::Router.into(),
            LsaBody::Network(_) => LsaTypeCode::Network.into(),
            LsaBody::SummaryNetwork(_) => LsaTypeCode::SummaryNetwork.into(),
            LsaBody::SummaryRouter(_) => LsaTypeCode::SummaryRouter.into(),
            LsaBody::AsExternal(_) => LsaTypeCode::AsExternal.into(),
            LsaBody::Nssa(_) => LsaTypeCode::Nssa.into(),
            LsaBody::OpaqueLink(_) => LsaTypeCode::OpaqueLink.into(),
            LsaBody::OpaqueArea(_) => LsaTypeCode::OpaqueArea.into(),
            LsaBody::OpaqueAs(_) => LsaTypeCode::OpaqueAs.into(),
            LsaBody::Unknown(_) => LsaType(0),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(
            self,
            LsaBody::Unknown(_)
                | LsaBody::OpaqueLink(LsaOpaque::Unknown(_))
                | LsaBody::OpaqueArea(LsaOpaque::Unknown(_))
                | LsaBody::OpaqueAs(LsaOpaque::Unknown(_))
        )
    }

    pub fn as_summary(&self) -> Option<&LsaSummary> {
        match self {
            LsaBody::SummaryNetwork(summary) | LsaBody::SummaryRouter(summary) => Some(summary),
            _ => None,
        }
    }

    fn validate(&self, hdr: &LsaHdr) -> Result<(), LsaValidationError> {
        match self {
            LsaBody::Router(lsa) => lsa.validate(hdr),
            _ => Ok(()),
        }
    }
}

// A fully decoded LSA: header, typed body, and enough bookkeeping to derive
// its current age on demand.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Lsa {
    // Raw encoded bytes, kept around so re-flooding never re-serializes.
    #[serde(default, skip_serializing)]
    pub raw: Bytes,
    pub hdr: LsaHdr,
    pub body: LsaBody,
    // Wall-clock instant the LSA entered the LSDB; combined with `hdr.age`
    // this gives the current age without a background ticking task.
    #[serde(skip)]
    pub base_time: Option<Instant>,
}

impl Lsa {
    /// Conservative upper bound chosen to avoid fragmentation even over
    /// low-MTU links; matches the LSU encoder's per-datagram budget.
    pub const MAX_LENGTH: usize = 1024;

    pub fn age(&self) -> u16 {
        match self.base_time {
            Some(base_time) => {
                let elapsed = u16::try_from(base_time.elapsed().as_secs()).unwrap_or(u16::MAX);
                std::cmp::min(self.hdr.age.saturating_add(elapsed), LSA_MAX_AGE)
            }
            None => self.hdr.age,
        }
    }

    pub fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        let buf_orig = buf.clone();
        let hdr = LsaHdr::decode(buf)?;
        let lsa_len = hdr.length;
        if lsa_len < LsaHdr::LENGTH {
            return Err(DecodeError::InvalidLsaLength);
        }
        let body_len = lsa_len - LsaHdr::LENGTH;
        if buf.remaining() < body_len as usize {
            return Err(DecodeError::InvalidLsaLength);
        }
        let mut buf_body = buf.copy_to_bytes(body_len as usize);
        let body = LsaBody::decode(hdr.lsa_type, hdr.lsa_id, &mut buf_body)?;

        Ok(Lsa {
            raw: buf_orig.slice(0..lsa_len as usize),
            hdr,
            body,
            base_time: Some(Instant::now()),
        })
    }

    pub fn validate(&self) -> Result<(), LsaValidationError> {
        if self.hdr.age > LSA_MAX_AGE {
            return Err(LsaValidationError::InvalidLsaAge);
        }
        if self.hdr.seq_no == LSA_RESERVED_SEQ_NO {
            return Err(LsaValidationError::InvalidLsaSeqNo);
        }
        if !self.is_checksum_valid() {
            return Err(LsaValidationError::InvalidChecksum);
        }
        self.body.validate(&self.hdr)
    }

    fn is_checksum_valid(&self) -> bool {
        fletcher::calc_fletcher16(&self.raw[2..self.hdr.length as usize]) == 0
    }

    /// RFC 1008 Fletcher checksum over `data`, which must exclude the
    /// 2-byte age field. Returns the two checksum bytes to place at
    /// offset 16 of the LSA.
    pub fn checksum(data: &[u8]) -> [u8; 2] {
        let checksum = fletcher::calc_fletcher16(data);
        let mut checkbyte0 = (checksum & 0x00FF) as i32;
        let mut checkbyte1 = ((checksum >> 8) & 0x00FF) as i32;

        let sop = data.len() as u16 - 15;
        let mut x = (sop as i32 * checkbyte0 - checkbyte1) % 255;
        if x <= 0 {
            x += 255;
        }
        checkbyte1 = 510 - checkbyte0 - x;
        if checkbyte1 > 255 {
            checkbyte1 -= 255;
        }
        checkbyte0 = x;
        [checkbyte0 as u8, checkbyte1 as u8]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_lsa_round_trip() {
        let body = LsaBody::Router(LsaRouter {
            flags: LsaRouterFlags::empty(),
            links: vec![LsaRouterLink::new(
                LsaRouterLinkType::PointToPoint,
                Ipv4Addr::new(10, 0, 0, 1),
                Ipv4Addr::new(10, 0, 0, 2),
                10,
            )],
        });
        let hdr = LsaHdr {
            age: 0,
            options: Options::E,
            lsa_type: body.lsa_type(),
            lsa_id: Ipv4Addr::new(1, 1, 1, 1),
            adv_rtr: Ipv4Addr::new(1, 1, 1, 1),
            seq_no: LSA_INIT_SEQ_NO,
            cksum: 0,
            length: 0,
        };

        let mut buf = BytesMut::new();
        hdr.encode(&mut buf);
        body.encode(&mut buf);
        let lsa_len = buf.len() as u16;
        buf[18..20].copy_from_slice(&lsa_len.to_be_bytes());
        let cksum = Lsa::checksum(&buf[2..lsa_len as usize]);
        buf[16..18].copy_from_slice(&cksum);

        let mut rbuf = buf.freeze();
        let lsa = Lsa::decode(&mut rbuf).unwrap();
        assert!(lsa.validate().is_ok());
        assert_eq!(lsa.body, body);
    }

    #[test]
    fn checksum_detects_corruption() {
        let body = LsaBody::Network(LsaNetwork {
            mask: Ipv4Addr::new(255, 255, 255, 0),
            attached_rtrs: Default::default(),
        });
        let hdr = LsaHdr {
            age: 0,
            options: Options::E,
            lsa_type: body.lsa_type(),
            lsa_id: Ipv4Addr::new(10, 0, 0, 1),
            adv_rtr: Ipv4Addr::new(1, 1, 1, 1),
            seq_no: LSA_INIT_SEQ_NO,
            cksum: 0,
            length: 0,
        };
        let mut buf = BytesMut::new();
        hdr.encode(&mut buf);
        body.encode(&mut buf);
        let lsa_len = buf.len() as u16;
        buf[18..20].copy_from_slice(&lsa_len.to_be_bytes());
        let cksum = Lsa::checksum(&buf[2..lsa_len as usize]);
        buf[16..18].copy_from_slice(&cksum);

        // Corrupt a single byte past the age field.
        buf[20] ^= 0xff;
        let mut rbuf = buf.freeze();
        let lsa = Lsa::decode(&mut rbuf).unwrap();
        assert_eq!(lsa.validate(), Err(LsaValidationError::InvalidChecksum));
    }
}
