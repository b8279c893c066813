//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use ospfprobe_packet::lsa::LsaHdr;
use ospfprobe_packet::packet::Packet;
use tracing::{debug, debug_span, trace};

use crate::interface::ism;
use crate::neighbor::nsm;

/// Loggable probe events. One variant per traced occurrence; the `log`
/// method dispatches each to a span-scoped `tracing::debug!` call.
#[derive(Debug)]
pub enum Debug<'a> {
    // Instance / interface lifecycle
    InstanceStart,
    InstanceStop,
    InterfaceStart(&'a str),
    InterfaceStop(&'a str),
    IsmEvent(&'a ism::State, &'a ism::Event),
    IsmTransition(&'a ism::State, &'a ism::State),
    // Neighbors
    NeighborCreate(Ipv4Addr),
    NeighborDelete(Ipv4Addr),
    NsmEvent(Ipv4Addr, &'a nsm::State, &'a nsm::Event),
    NsmTransition(Ipv4Addr, &'a nsm::State, &'a nsm::State),
    // Network
    PacketRx(&'a Ipv4Addr, &'a Packet),
    PacketTx(&'a Ipv4Addr, &'a Packet),
    PacketRxIgnore(Ipv4Addr, &'a nsm::State),
    /// Full decoded PDU dump, gated behind the `packet_display` config flag
    /// rather than a bare log level, since it is verbose even at trace.
    PacketDisplay(&'a str, &'a Ipv4Addr, &'a Packet),
    // LSDB maintenance
    LsaDiscard(Ipv4Addr, &'a LsaHdr, &'a str),
    LsaMinArrivalDiscard(Ipv4Addr, &'a LsaHdr),
    LsaInstall(&'a LsaHdr),
    LsaPurge(&'a LsaHdr),
}

// ===== impl Debug =====

impl<'a> Debug<'a> {
    pub fn log(&self) {
        match self {
            Debug::InstanceStart | Debug::InstanceStop => {
                debug!("{}", self);
            }
            Debug::InterfaceStart(name) | Debug::InterfaceStop(name) => {
                debug_span!("interface", %name).in_scope(|| {
                    debug!("{}", self);
                })
            }
            Debug::IsmEvent(state, event) => debug_span!("fsm").in_scope(|| {
                debug!(?state, ?event, "{}", self);
            }),
            Debug::IsmTransition(old_state, new_state) => debug_span!("fsm").in_scope(|| {
                debug!(?old_state, ?new_state, "{}", self);
            }),
            Debug::NeighborCreate(router_id) | Debug::NeighborDelete(router_id) => {
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug!("{}", self);
                })
            }
            Debug::NsmEvent(router_id, state, event) => {
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug_span!("fsm").in_scope(|| {
                        debug!(?state, ?event, "{}", self);
                    })
                })
            }
            Debug::NsmTransition(router_id, old_state, new_state) => {
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug_span!("fsm").in_scope(|| {
                        debug!(?old_state, ?new_state, "{}", self);
                    })
                })
            }
            Debug::PacketRx(src, packet) => debug_span!("network", %src).in_scope(|| {
                debug!(pkt_type = ?packet.pkt_type(), "{}", self);
            }),
            Debug::PacketTx(dst, packet) => debug_span!("network", %dst).in_scope(|| {
                debug!(pkt_type = ?packet.pkt_type(), "{}", self);
            }),
            Debug::PacketRxIgnore(router_id, state) => {
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug!(?state, "{}", self);
                })
            }
            Debug::PacketDisplay(direction, addr, packet) => {
                debug_span!("network", %direction, %addr).in_scope(|| {
                    let data = serde_json::to_string(packet).unwrap();
                    trace!(%data, "{}", self);
                })
            }
            Debug::LsaDiscard(router_id, lsa_hdr, reason) => {
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug!(?lsa_hdr, %reason, "{}", self);
                })
            }
            Debug::LsaMinArrivalDiscard(router_id, lsa_hdr) => {
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug!(?lsa_hdr, "{}", self);
                })
            }
            Debug::LsaInstall(lsa_hdr) | Debug::LsaPurge(lsa_hdr) => {
                debug!(?lsa_hdr, "{}", self);
            }
        }
    }
}

impl<'a> std::fmt::Display for Debug<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::InstanceStart => write!(f, "starting instance"),
            Debug::InstanceStop => write!(f, "stopping instance"),
            Debug::InterfaceStart(..) => write!(f, "starting interface"),
            Debug::InterfaceStop(..) => write!(f, "stopping interface"),
            Debug::IsmEvent(..) => write!(f, "event"),
            Debug::IsmTransition(..) => write!(f, "state transition"),
            Debug::NeighborCreate(..) => write!(f, "neighbor created"),
            Debug::NeighborDelete(..) => write!(f, "neighbor deleted"),
            Debug::NsmEvent(..) => write!(f, "event"),
            Debug::NsmTransition(..) => write!(f, "state transition"),
            Debug::PacketRx(..) | Debug::PacketTx(..) => write!(f, "packet"),
            Debug::PacketRxIgnore(..) => {
                write!(f, "ignoring packet received from a non-adjacent neighbor")
            }
            Debug::PacketDisplay(..) => write!(f, "decoded PDU"),
            Debug::LsaDiscard(..) => write!(f, "discarding LSA"),
            Debug::LsaMinArrivalDiscard(..) => {
                write!(f, "discarding LSA due to the MinLSArrival check")
            }
            Debug::LsaInstall(..) => write!(f, "installing LSA"),
            Debug::LsaPurge(..) => write!(f, "purging MaxAge LSA"),
        }
    }
}
