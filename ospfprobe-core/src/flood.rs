//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cmp::Ordering;
use std::net::Ipv4Addr;

use ospfprobe_packet::lsa::{Lsa, LsaHdr, LsaTypeCode};
use ospfprobe_packet::lsupdate::LsUpdate;
use ospfprobe_packet::options::Options;

use crate::debug::Debug;
use crate::lsdb::LsdbHandle;
use crate::neighbor::{nsm, NbrAction, Neighbor};

/// LSA types the probe ever accepts onto the LSDB (§4.8 step 2).
const ALLOWED_TYPES: &[LsaTypeCode] = &[
    LsaTypeCode::Router,
    LsaTypeCode::Network,
    LsaTypeCode::SummaryNetwork,
    LsaTypeCode::SummaryRouter,
    LsaTypeCode::AsExternal,
    LsaTypeCode::Nssa,
    LsaTypeCode::OpaqueLink,
    LsaTypeCode::OpaqueArea,
    LsaTypeCode::OpaqueAs,
];

/// Outcome of processing one received LS Update.
#[derive(Default)]
pub struct FloodResult {
    pub unicast_acks: Vec<LsaHdr>,
    pub multicast_acks: Vec<LsaHdr>,
    pub nbr_actions: Vec<NbrAction>,
}

/// Processes an incoming LS Update per §4.8, one LSA at a time. `lsdb` is
/// the handle to the area's owner task; all reads and writes of LSDB state
/// are routed through it, so concurrent updates from other neighbors are
/// serialized by the owner task itself (§5, §9).
pub async fn process_lsupdate(
    nbr: &mut Neighbor,
    options: Options,
    lsdb: &LsdbHandle,
    update: &LsUpdate,
) -> FloodResult {
    let mut result = FloodResult::default();

    for lsa in &update.lsas {
        process_one(nbr, options, lsdb, lsa, &mut result).await;
    }

    result
}

async fn process_one(
    nbr: &mut Neighbor,
    options: Options,
    lsdb: &LsdbHandle,
    lsa: &Lsa,
    result: &mut FloodResult,
) {
    // Step 1: Fletcher checksum.
    if lsa.validate().is_err() {
        Debug::LsaDiscard(nbr.router_id, &lsa.hdr, "checksum").log();
        return;
    }

    // Step 2: allowed type.
    let Some(type_code) = lsa.hdr.lsa_type.type_code() else {
        Debug::LsaDiscard(nbr.router_id, &lsa.hdr, "unknown type").log();
        return;
    };
    if !ALLOWED_TYPES.contains(&type_code) {
        Debug::LsaDiscard(nbr.router_id, &lsa.hdr, "disallowed type").log();
        return;
    }

    // Step 3: scope gating.
    let scope_ok = match type_code {
        LsaTypeCode::AsExternal => options.contains(Options::E),
        LsaTypeCode::Nssa => options.contains(Options::NP),
        LsaTypeCode::OpaqueLink | LsaTypeCode::OpaqueArea | LsaTypeCode::OpaqueAs => {
            options.contains(Options::O)
        }
        _ => true,
    };
    if !scope_ok {
        Debug::LsaDiscard(nbr.router_id, &lsa.hdr, "scope mismatch").log();
        return;
    }

    let key = lsa.hdr.key();

    // Step 4: unsolicited MaxAge.
    if lsa.hdr.is_maxage()
        && !lsdb.contains(key).await
        && !matches!(nbr.state, nsm::State::Exchange | nsm::State::Loading)
    {
        result.unicast_acks.push(lsa.hdr);
        return;
    }

    // Step 5: compare to the existing copy. Captured once — step 6 below
    // re-uses this verdict since `lsdb.install` may otherwise shift the
    // comparison out from under it.
    let cmp = lsdb.compare(lsa.hdr).await;
    match cmp {
        None | Some(Ordering::Greater) => {
            if lsdb.min_arrival_check(key).await {
                Debug::LsaMinArrivalDiscard(nbr.router_id, &lsa.hdr).log();
                return;
            }

            nbr.ls_rxmt_remove(&key);
            lsdb.install(lsa.clone());
            result.multicast_acks.push(lsa.hdr);

            result.nbr_actions.extend(nbr.ls_request_satisfied(&key));
        }
        Some(Ordering::Equal) => {
            if nbr.ls_rxmt_list.contains(&key) {
                nbr.ls_rxmt_remove(&key);
            } else {
                result.unicast_acks.push(lsa.hdr);
            }
        }
        Some(Ordering::Less) => {
            let purge_in_progress =
                lsa.hdr.seq_no == ospfprobe_packet::lsa::LSA_MAX_SEQ_NO && lsa.hdr.is_maxage();
            if purge_in_progress {
                return;
            }
            // The conforming response is to send back the locally-held
            // newer copy; the probe never originates or re-floods, so it
            // drops instead.
        }
    }

    // Step 6: BadLSReq — incoming is on our LSR list but wasn't newer.
    if nbr.ls_request_list.contains(&key) && !matches!(cmp, Some(Ordering::Greater) | None) {
        result.nbr_actions.extend(nbr.fsm(nsm::Event::BadLSReq));
    }
}

/// Destination for multicast LSAck emission (§4.8 LSAck emission).
pub fn ack_multicast_addr(link_type: crate::interface::LinkType) -> Ipv4Addr {
    match link_type {
        crate::interface::LinkType::Broadcast => *crate::network::ALL_DR_RTRS,
        crate::interface::LinkType::PointToPoint => *crate::network::ALL_SPF_RTRS,
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use ospfprobe_packet::lsa::router::{LsaRouterFlags, LsaRouter};
    use ospfprobe_packet::lsa::{LsaBody, LsaHdr, LSA_INIT_SEQ_NO};

    use super::*;

    fn build_lsa(seq_no: u32, age: u16) -> Lsa {
        let body = LsaBody::Router(LsaRouter {
            flags: LsaRouterFlags::empty(),
            links: vec![],
        });
        let hdr = LsaHdr {
            age,
            options: Options::E,
            lsa_type: body.lsa_type(),
            lsa_id: Ipv4Addr::new(1, 1, 1, 1),
            adv_rtr: Ipv4Addr::new(1, 1, 1, 1),
            seq_no,
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
        Lsa::decode(&mut rbuf).unwrap()
    }

    fn nbr() -> Neighbor {
        Neighbor::new(Ipv4Addr::new(2, 2, 2, 2), Ipv4Addr::new(10, 0, 0, 2))
    }

    #[tokio::test]
    async fn new_lsa_installs_and_queues_multicast_ack() {
        let (lsdb, _task) = crate::lsdb::spawn();
        let mut nbr = nbr();
        let lsa = build_lsa(LSA_INIT_SEQ_NO, 10);
        let update = LsUpdate {
            hdr: ospfprobe_packet::header::PacketHdr::new(
                ospfprobe_packet::header::PacketType::LsUpdate,
                nbr.router_id,
                Ipv4Addr::new(0, 0, 0, 0),
            ),
            lsas: vec![lsa.clone()],
        };

        let result = process_lsupdate(&mut nbr, Options::E, &lsdb, &update).await;

        assert!(lsdb.contains(lsa.hdr.key()).await);
        assert_eq!(result.multicast_acks.len(), 1);
        assert!(result.unicast_acks.is_empty());
    }

    #[tokio::test]
    async fn equal_copy_not_on_rxmt_list_queues_unicast_ack() {
        let (lsdb, _task) = crate::lsdb::spawn();
        let mut nbr = nbr();
        let lsa = build_lsa(LSA_INIT_SEQ_NO, 100);
        lsdb.install(lsa.clone());
        // Let the install land before the comparison below observes it.
        tokio::task::yield_now().await;

        let incoming = build_lsa(LSA_INIT_SEQ_NO, 105);
        let update = LsUpdate {
            hdr: ospfprobe_packet::header::PacketHdr::new(
                ospfprobe_packet::header::PacketType::LsUpdate,
                nbr.router_id,
                Ipv4Addr::new(0, 0, 0, 0),
            ),
            lsas: vec![incoming.clone()],
        };

        let result = process_lsupdate(&mut nbr, Options::E, &lsdb, &update).await;

        assert_eq!(result.unicast_acks.len(), 1);
        assert!(result.multicast_acks.is_empty());
    }

    #[tokio::test]
    async fn older_copy_is_dropped_silently() {
        let (lsdb, _task) = crate::lsdb::spawn();
        let mut nbr = nbr();
        let newer = build_lsa(LSA_INIT_SEQ_NO + 1, 10);
        lsdb.install(newer.clone());
        tokio::task::yield_now().await;

        let older = build_lsa(LSA_INIT_SEQ_NO, 10);
        let update = LsUpdate {
            hdr: ospfprobe_packet::header::PacketHdr::new(
                ospfprobe_packet::header::PacketType::LsUpdate,
                nbr.router_id,
                Ipv4Addr::new(0, 0, 0, 0),
            ),
            lsas: vec![older],
        };

        let result = process_lsupdate(&mut nbr, Options::E, &lsdb, &update).await;

        assert!(result.unicast_acks.is_empty());
        assert!(result.multicast_acks.is_empty());
        assert_eq!(lsdb.get(newer.hdr.key()).await.unwrap().hdr.seq_no, newer.hdr.seq_no);
    }

    #[tokio::test]
    async fn not_newer_on_request_list_triggers_bad_ls_req() {
        let (lsdb, _task) = crate::lsdb::spawn();
        let mut nbr = nbr();
        nbr.state = nsm::State::Exchange;
        let newer = build_lsa(LSA_INIT_SEQ_NO + 1, 10);
        lsdb.install(newer.clone());
        tokio::task::yield_now().await;
        nbr.ls_request_list.push(newer.hdr.key());

        let older = build_lsa(LSA_INIT_SEQ_NO, 10);
        let update = LsUpdate {
            hdr: ospfprobe_packet::header::PacketHdr::new(
                ospfprobe_packet::header::PacketType::LsUpdate,
                nbr.router_id,
                Ipv4Addr::new(0, 0, 0, 0),
            ),
            lsas: vec![older],
        };

        let result = process_lsupdate(&mut nbr, Options::E, &lsdb, &update).await;

        assert_eq!(nbr.state, nsm::State::ExStart);
        assert!(result.nbr_actions.iter().any(|a| matches!(a, NbrAction::SendDbDesc(_))));
    }
}
