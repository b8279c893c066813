//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use bytes::{Buf, Bytes};
use internet_checksum::Checksum;

/// A `SOCK_RAW` socket bound to protocol 89 always prepends the IPv4 header
/// on receive (`IP_HDRINCL` is never set); on send the kernel builds its own
/// header, so nothing here is needed in that direction. This strips and
/// validates just enough of that header to hand the OSPF payload to
/// [`ospfprobe_packet::packet::Packet::decode`].
pub struct IpHdr {
    pub header_len: usize,
    pub dst: Ipv4Addr,
}

/// Validates the IPv4 header checksum and returns its length and
/// destination address. Returns `None` on a short buffer, a non-IPv4
/// version, or a failed checksum.
pub fn parse_header(buf: &Bytes) -> Option<IpHdr> {
    if buf.len() < 20 {
        return None;
    }
    let version = buf[0] >> 4;
    if version != 4 {
        return None;
    }
    let header_len = ((buf[0] & 0x0f) as usize) * 4;
    if header_len < 20 || buf.len() < header_len {
        return None;
    }
    if !verify_cksum(&buf[0..header_len]) {
        return None;
    }
    let dst = Ipv4Addr::new(buf[16], buf[17], buf[18], buf[19]);
    Some(IpHdr { header_len, dst })
}

fn verify_cksum(hdr: &[u8]) -> bool {
    let mut cksum = Checksum::new();
    cksum.add_bytes(hdr);
    cksum.checksum() == [0; 2]
}

/// Strips the validated IPv4 header off `buf`, returning the OSPF payload
/// and the packet's destination address.
pub fn strip_header(mut buf: Bytes) -> Option<(Bytes, Ipv4Addr)> {
    let ip_hdr = parse_header(&buf)?;
    let dst = ip_hdr.dst;
    buf.advance(ip_hdr.header_len);
    Some((buf, dst))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(dst: Ipv4Addr, payload: &[u8]) -> Bytes {
        let mut hdr = vec![
            0x45, 0x00, // version/IHL, DSCP/ECN
            0x00, 0x00, // total length, patched below
            0x00, 0x00, 0x00, 0x00, // identification, flags/fragment offset
            0x01, 89, // TTL, protocol (OSPF)
            0x00, 0x00, // checksum, patched below
        ];
        hdr.extend_from_slice(&[10, 0, 0, 1]);
        hdr.extend_from_slice(&dst.octets());
        let total_len = (hdr.len() + payload.len()) as u16;
        hdr[2..4].copy_from_slice(&total_len.to_be_bytes());

        let mut cksum = Checksum::new();
        cksum.add_bytes(&hdr);
        hdr[10..12].copy_from_slice(&cksum.checksum());

        hdr.extend_from_slice(payload);
        Bytes::from(hdr)
    }

    #[test]
    fn strips_header_and_returns_destination() {
        let dst = Ipv4Addr::new(224, 0, 0, 5);
        let buf = build(dst, b"payload");
        let (body, parsed_dst) = strip_header(buf).unwrap();
        assert_eq!(parsed_dst, dst);
        assert_eq!(&body[..], b"payload");
    }

    #[test]
    fn rejects_bad_checksum() {
        let mut buf = build(Ipv4Addr::new(224, 0, 0, 5), b"payload").to_vec();
        buf[1] ^= 0xff;
        assert!(parse_header(&Bytes::from(buf)).is_none());
    }

    #[test]
    fn rejects_short_buffer() {
        assert!(parse_header(&Bytes::from_static(&[0x45, 0x00])).is_none());
    }
}
