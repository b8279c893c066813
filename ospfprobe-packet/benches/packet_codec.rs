use std::hint::black_box;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::LazyLock as Lazy;

use criterion::{Criterion, criterion_group, criterion_main};
use ospfprobe_packet::header::{PacketHdr, PacketType};
use ospfprobe_packet::lsa::router::{LsaRouter, LsaRouterFlags, LsaRouterLink, LsaRouterLinkType};
use ospfprobe_packet::lsa::summary::LsaSummary;
use ospfprobe_packet::lsa::{Lsa, LsaBody, LsaHdr, LSA_INIT_SEQ_NO};
use ospfprobe_packet::lsupdate::LsUpdate;
use ospfprobe_packet::options::Options;
use ospfprobe_packet::packet::Packet;

fn lsa(adv_rtr: Ipv4Addr, lsa_id: Ipv4Addr, body: LsaBody) -> Lsa {
    use bytes::BytesMut;

    let mut hdr = LsaHdr {
        age: 49,
        options: Options::E,
        lsa_type: body.lsa_type(),
        lsa_id,
        adv_rtr,
        seq_no: LSA_INIT_SEQ_NO,
        cksum: 0,
        length: 0,
    };
    let mut buf = BytesMut::new();
    hdr.encode(&mut buf);
    body.encode(&mut buf);
    let lsa_len = buf.len() as u16;
    buf[18..20].copy_from_slice(&lsa_len.to_be_bytes());
    hdr.length = lsa_len;
    let cksum = Lsa::checksum(&buf[2..lsa_len as usize]);
    buf[16..18].copy_from_slice(&cksum);
    hdr.cksum = u16::from_be_bytes(cksum);

    Lsa {
        raw: buf.freeze(),
        hdr,
        body,
        base_time: None,
    }
}

static PACKET: Lazy<Packet> = Lazy::new(|| {
    let rtr = Ipv4Addr::from_str("2.2.2.2").unwrap();
    Packet::LsUpdate(LsUpdate {
        hdr: PacketHdr::new(PacketType::LsUpdate, rtr, Ipv4Addr::from_str("0.0.0.1").unwrap()),
        lsas: vec![
            lsa(
                rtr,
                rtr,
                LsaBody::Router(LsaRouter {
                    flags: LsaRouterFlags::B,
                    links: vec![LsaRouterLink::new(
                        LsaRouterLinkType::StubNetwork,
                        Ipv4Addr::from_str("10.0.1.0").unwrap(),
                        Ipv4Addr::from_str("255.255.255.0").unwrap(),
                        10,
                    )],
                }),
            ),
            lsa(
                rtr,
                rtr,
                LsaBody::SummaryNetwork(LsaSummary {
                    mask: Ipv4Addr::from_str("255.255.255.255").unwrap(),
                    metric: 0,
                }),
            ),
            lsa(
                rtr,
                Ipv4Addr::from_str("10.0.2.0").unwrap(),
                LsaBody::SummaryNetwork(LsaSummary {
                    mask: Ipv4Addr::from_str("255.255.255.0").unwrap(),
                    metric: 10,
                }),
            ),
        ],
    })
});

fn packet_encode(n: u64) {
    for _ in 0..n {
        black_box(PACKET.encode());
    }
}

fn packet_decode(n: u64) {
    for _ in 0..n {
        let mut buf = PACKET.encode();
        black_box(Packet::decode(&mut buf).unwrap());
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("Packet encode", |b| b.iter(|| packet_encode(black_box(10000))));
    c.bench_function("Packet decode", |b| b.iter(|| packet_decode(black_box(10000))));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
