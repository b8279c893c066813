//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! The running OSPF instance: one raw socket, one interface, one owner task.
//!
//! All mutable protocol state -- the interface's ISM state, its neighbor
//! table, and every per-neighbor timer -- lives behind a single `mpsc`
//! queue drained by [`Worker::run`]. The receiver task and every timer
//! callback only ever post a message onto that queue; they never touch
//! [`Interface`] directly. This mirrors the LSDB's actor pattern (§9) and
//! extends it to the neighbor table, trading the receiver/LSU-worker
//! concurrency described in §5 for a single serialization point -- an
//! accepted simplification, since the probe only ever has one real
//! neighbor in practice.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use ospfprobe_packet::dbdesc::DbDesc;
use ospfprobe_packet::header::{PacketHdr, PacketType};
use ospfprobe_packet::lsa::LsaKey;
use ospfprobe_packet::lsack::LsAck;
use ospfprobe_packet::lsupdate::LsUpdate;
use ospfprobe_packet::packet::Packet;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::debug::Debug;
use crate::error::{Error, InterfaceCfgError};
use crate::flood;
use crate::interface::{ism, Interface, InterfaceConfig, LinkType};
use crate::lsdb::LsdbHandle;
use crate::neighbor::{self, nsm, NbrAction};
use crate::network::{self, MulticastAddr, OspfSocket};
use crate::stats::{Stats, StatsSnapshot};
use crate::task::{IntervalTask, Task, TimeoutTask};

/// How often the LSDB is swept for MaxAge entries (§4.4, §4.6). Kept in
/// line with MinLSArrival's one-second granularity.
const AGE_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// A read-only snapshot of the instance, handed to the query surface (§6).
#[derive(Debug, Serialize)]
pub struct InstanceSnapshot {
    pub router_id: Ipv4Addr,
    pub ifname: String,
    pub ism_state: ism::State,
    pub neighbors: Vec<NeighborSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct NeighborSnapshot {
    pub router_id: Ipv4Addr,
    pub address: Ipv4Addr,
    pub state: nsm::State,
}

/// Requests the instance owner task accepts. Everything that touches
/// [`Interface`] arrives here, whether from the network, a timer, or the
/// query surface.
enum InstanceMsg {
    Rx(Ipv4Addr, Packet),
    HelloTimer,
    WaitTimer,
    AgeSweep,
    InactivityTimer(Ipv4Addr),
    DdRxmt(Ipv4Addr),
    LsrRxmt(Ipv4Addr),
    Snapshot(oneshot::Sender<InstanceSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

/// A cheaply-cloneable handle to the running instance.
#[derive(Clone)]
pub struct InstanceHandle {
    tx: mpsc::UnboundedSender<InstanceMsg>,
    pub lsdb: LsdbHandle,
    pub stats: Arc<Stats>,
}

impl InstanceHandle {
    pub async fn snapshot(&self) -> Option<InstanceSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(InstanceMsg::Snapshot(reply_tx)).ok()?;
        reply_rx.await.ok()
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Leaves the multicast groups and stops the owner task. Idempotent
    /// only in the sense that a second call finds the channel closed and
    /// silently does nothing.
    pub async fn shutdown(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(InstanceMsg::Shutdown(reply_tx)).is_ok() {
            let _ = reply_rx.await;
        }
    }
}

/// Spawns the raw socket, the receiver task, and the instance owner task.
/// `lsdb` is shared with whatever else reaches into the area's database
/// (currently just the query surface); the caller owns its lifetime.
pub fn spawn(
    config: InterfaceConfig,
    ifindex: u32,
    lsdb: LsdbHandle,
    packet_display: bool,
) -> Result<(InstanceHandle, Task<()>), Error> {
    let socket = Arc::new(OspfSocket::new(&config.name).map_err(Error::IoError)?);
    socket
        .join_multicast(MulticastAddr::AllSpfRtrs, ifindex)
        .map_err(Error::IoError)?;
    if config.link_type == LinkType::Broadcast {
        socket
            .join_multicast(MulticastAddr::AllDrRtrs, ifindex)
            .map_err(Error::IoError)?;
    }

    let stats = Arc::new(Stats::new());
    let (tx, rx) = mpsc::unbounded_channel();

    let mut receiver = Task::spawn(receiver_task(socket.clone(), config.address, tx.clone()));
    receiver.detach();

    let router_id = config.router_id;
    let mut worker = Worker {
        router_id,
        ifindex,
        iface: Interface::new(config),
        lsdb: lsdb.clone(),
        stats: stats.clone(),
        socket,
        tx: tx.clone(),
        rx,
        packet_display,
    };

    let task = Task::spawn(async move {
        Debug::InstanceStart.log();
        worker.iface.fsm(ism::Event::InterfaceUp);
        worker.start_interface_timers();
        worker.run().await;
        Debug::InstanceStop.log();
    });

    Ok((InstanceHandle { tx, lsdb, stats }, task))
}

/// Reads datagrams off the raw socket and forwards decoded packets to the
/// owner task. Packets from the probe's own address or addressed to
/// AllDRouters (the probe never contends for DR/BDR) are dropped here,
/// before they ever reach protocol logic.
async fn receiver_task(socket: Arc<OspfSocket>, own_addr: Ipv4Addr, tx: mpsc::UnboundedSender<InstanceMsg>) {
    loop {
        let (raw, src) = match socket.recv_from().await {
            Ok(result) => result,
            Err(error) => {
                Error::from(error).log();
                continue;
            }
        };

        if src == own_addr {
            continue;
        }

        let Some((mut payload, dst)) = crate::ip::strip_header(raw) else {
            continue;
        };

        if dst == *network::ALL_DR_RTRS {
            continue;
        }

        match Packet::decode(&mut payload) {
            Ok(packet) => {
                if tx.send(InstanceMsg::Rx(src, packet)).is_err() {
                    break;
                }
            }
            Err(error) => Error::PacketDecodeError(error).log(),
        }
    }
}

/// The sole owner of [`Interface`] and its neighbor table.
struct Worker {
    router_id: Ipv4Addr,
    ifindex: u32,
    iface: Interface,
    lsdb: LsdbHandle,
    stats: Arc<Stats>,
    socket: Arc<OspfSocket>,
    tx: mpsc::UnboundedSender<InstanceMsg>,
    rx: mpsc::UnboundedReceiver<InstanceMsg>,
    /// When set, every received/sent PDU is additionally dumped in full at
    /// trace level (§6, `packet_display`). Off by default: the per-packet
    /// JSON encode is not free.
    packet_display: bool,
}

impl Worker {
    async fn run(&mut self) {
        while let Some(msg) = self.rx.recv().await {
            match msg {
                InstanceMsg::Rx(src, packet) => self.handle_rx(src, packet).await,
                InstanceMsg::HelloTimer => {
                    let hello = self.iface.generate_hello();
                    self.send(*network::ALL_SPF_RTRS, Packet::Hello(hello)).await;
                }
                InstanceMsg::WaitTimer => {
                    self.iface.fsm(ism::Event::WaitTimer);
                }
                InstanceMsg::AgeSweep => self.handle_age_sweep().await,
                InstanceMsg::InactivityTimer(addr) => self.handle_inactivity_timer(addr).await,
                InstanceMsg::DdRxmt(addr) => self.handle_dd_rxmt(addr).await,
                InstanceMsg::LsrRxmt(addr) => self.handle_lsr_rxmt(addr).await,
                InstanceMsg::Snapshot(reply) => {
                    let _ = reply.send(self.snapshot());
                }
                InstanceMsg::Shutdown(reply) => {
                    if let Err(error) = self.socket.leave_multicast(MulticastAddr::AllSpfRtrs, self.ifindex) {
                        error.log();
                    }
                    if self.iface.config.link_type == LinkType::Broadcast {
                        if let Err(error) = self.socket.leave_multicast(MulticastAddr::AllDrRtrs, self.ifindex) {
                            error.log();
                        }
                    }
                    let _ = reply.send(());
                    break;
                }
            }
        }
    }

    fn start_interface_timers(&mut self) {
        let tx = self.tx.clone();
        self.iface.tasks.hello = Some(IntervalTask::new(self.iface.hello_interval(), true, move || {
            let tx = tx.clone();
            async move {
                let _ = tx.send(InstanceMsg::HelloTimer);
            }
        }));

        let tx = self.tx.clone();
        self.iface.tasks.age_sweep = Some(IntervalTask::new(AGE_SWEEP_INTERVAL, false, move || {
            let tx = tx.clone();
            async move {
                let _ = tx.send(InstanceMsg::AgeSweep);
            }
        }));

        if self.iface.state == ism::State::Waiting {
            let dead = Duration::from_secs(u64::from(self.iface.config.dead_interval()));
            let tx = self.tx.clone();
            self.iface.tasks.wait_timer = Some(TimeoutTask::new(dead, move || {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(InstanceMsg::WaitTimer);
                }
            }));
        }
    }

    async fn handle_rx(&mut self, src: Ipv4Addr, packet: Packet) {
        if packet.area_id() != self.iface.config.area_id {
            Error::InterfaceCfgError(
                packet.pkt_type(),
                InterfaceCfgError::AreaIdMismatch(packet.area_id(), self.iface.config.area_id),
            )
            .log();
            return;
        }

        Debug::PacketRx(&src, &packet).log();
        if self.packet_display {
            Debug::PacketDisplay("rx", &src, &packet).log();
        }
        self.stats.incr_recv(packet.pkt_type());

        match packet {
            Packet::Hello(hello) => self.handle_hello(src, hello).await,
            Packet::DbDesc(dbdesc) => self.handle_dbdesc(src, dbdesc).await,
            Packet::LsRequest(_) => {
                // Receiving-side LS Request handling is not implemented: the
                // probe never originates or re-floods LSAs, so there is
                // nothing it could send back in response.
            }
            Packet::LsUpdate(update) => self.handle_lsupdate(src, update).await,
            Packet::LsAck(_) => {
                // The probe never retransmits its own LSAs, so ls_rxmt_list
                // is always empty and there is nothing for an ack to clear.
            }
        }

        self.stats.incr_handled();
    }

    async fn handle_hello(&mut self, src: Ipv4Addr, hello: ospfprobe_packet::hello::Hello) {
        if let Err(error) = self.iface.validate_hello(&hello) {
            Error::InterfaceCfgError(PacketType::Hello, error).log();
            return;
        }

        self.iface.learned.dr = hello.dr.filter(|dr| *dr != Ipv4Addr::UNSPECIFIED);
        self.iface.learned.bdr = hello.bdr.filter(|bdr| *bdr != Ipv4Addr::UNSPECIFIED);

        let adj_warranted = self.iface.adjacency_warranted(src);
        let we_are_listed = hello.neighbors.contains(&self.router_id);

        let nbr = self
            .iface
            .neighbors
            .entry(src)
            .or_insert_with(|| neighbor::Neighbor::new(hello.hdr.router_id, src));

        let mut actions = nbr.fsm(nsm::Event::HelloReceived);
        nbr.adj_warranted = adj_warranted;
        if we_are_listed {
            actions.extend(nbr.fsm(nsm::Event::TwoWayReceived));
        } else {
            actions.extend(nbr.fsm(nsm::Event::OneWayReceived));
        }

        self.apply_nbr_actions(src, actions).await;
    }

    async fn handle_dbdesc(&mut self, src: Ipv4Addr, dbdesc: DbDesc) {
        let Some(mut nbr) = self.iface.neighbors.remove(&src) else {
            Error::UnknownNeighbor(dbdesc.hdr.router_id).log();
            return;
        };

        let our_mtu = self.iface.config.mtu;
        let our_options = self.iface.config.options;
        let result = nbr
            .process_dbdesc(self.router_id, our_mtu, our_options, &dbdesc, &self.lsdb)
            .await;

        let actions = match result {
            Ok(actions) => actions,
            Err(_reason) => {
                Error::DbDescReject(nbr.router_id, nbr.state).log();
                nbr.fsm(nsm::Event::SeqNumberMismatch)
            }
        };

        self.iface.neighbors.insert(src, nbr);
        self.apply_nbr_actions(src, actions).await;
    }

    async fn handle_lsupdate(&mut self, src: Ipv4Addr, update: LsUpdate) {
        let Some(mut nbr) = self.iface.neighbors.remove(&src) else {
            Error::UnknownNeighbor(update.hdr.router_id).log();
            return;
        };

        let result =
            flood::process_lsupdate(&mut nbr, self.iface.config.options, &self.lsdb, &update).await;

        self.iface.neighbors.insert(src, nbr);
        self.apply_nbr_actions(src, result.nbr_actions).await;

        for hdr in result.unicast_acks {
            let ack = LsAck {
                hdr: PacketHdr::new(PacketType::LsAck, self.router_id, self.iface.config.area_id),
                lsa_hdrs: vec![hdr],
            };
            self.send(src, Packet::LsAck(ack)).await;
        }

        if !result.multicast_acks.is_empty() {
            let dst = flood::ack_multicast_addr(self.iface.config.link_type);
            let ack = LsAck {
                hdr: PacketHdr::new(PacketType::LsAck, self.router_id, self.iface.config.area_id),
                lsa_hdrs: result.multicast_acks,
            };
            self.send(dst, Packet::LsAck(ack)).await;
        }
    }

    async fn handle_age_sweep(&mut self) {
        let keys = self.lsdb.maxage_sweep().await;
        for key in keys {
            if self.purge_allowed(&key) {
                self.lsdb.remove(key);
            }
        }
    }

    /// A MaxAge LSA may only be purged once it is off every neighbor's
    /// retransmission list and no neighbor is still mid-synchronization
    /// (§4.4): purging out from under an ongoing Exchange/Loading would
    /// desync the comparisons that drive it.
    fn purge_allowed(&self, key: &LsaKey) -> bool {
        purge_allowed(self.iface.neighbors.values(), key)
    }

    async fn handle_inactivity_timer(&mut self, addr: Ipv4Addr) {
        let actions = match self.iface.neighbors.get_mut(&addr) {
            Some(nbr) => nbr.fsm(nsm::Event::InactivityTimer),
            None => return,
        };
        self.apply_nbr_actions(addr, actions).await;
    }

    async fn handle_dd_rxmt(&mut self, addr: Ipv4Addr) {
        let Some(nbr) = self.iface.neighbors.get(&addr) else {
            return;
        };
        if !matches!(nbr.state, nsm::State::ExStart | nsm::State::Exchange) {
            return;
        }
        if let Some(dd) = nbr.last_sent_dd.clone() {
            self.send(addr, Packet::DbDesc(dd)).await;
        }
    }

    async fn handle_lsr_rxmt(&mut self, addr: Ipv4Addr) {
        let Some(nbr) = self.iface.neighbors.get(&addr) else {
            return;
        };
        if nbr.state != nsm::State::Loading {
            return;
        }
        let keys = nbr.next_ls_request();
        if keys.is_empty() {
            return;
        }
        let hdr = PacketHdr::new(PacketType::LsRequest, self.router_id, self.iface.config.area_id);
        let lsr = neighbor::build_ls_request(hdr, keys);
        self.send(addr, Packet::LsRequest(lsr)).await;
    }

    /// Executes the side effects an NSM transition asked for (§9: the FSM
    /// returns data, the caller acts on it).
    async fn apply_nbr_actions(&mut self, addr: Ipv4Addr, actions: Vec<NbrAction>) {
        for action in actions {
            match action {
                NbrAction::SendDbDesc(mut dd) => {
                    dd.hdr = PacketHdr::new(PacketType::DbDesc, self.router_id, self.iface.config.area_id);
                    self.send(addr, Packet::DbDesc(dd)).await;
                    self.arm_dd_rxmt(addr);
                }
                NbrAction::SendLsRequest(keys) => {
                    let hdr =
                        PacketHdr::new(PacketType::LsRequest, self.router_id, self.iface.config.area_id);
                    let lsr = neighbor::build_ls_request(hdr, keys);
                    self.send(addr, Packet::LsRequest(lsr)).await;
                    self.arm_lsr_rxmt(addr);
                }
                NbrAction::StartInactivityTimer => self.arm_inactivity(addr),
                NbrAction::StopTimers => {
                    if let Some(nbr) = self.iface.neighbors.get_mut(&addr) {
                        nbr.tasks.dd_rxmt = None;
                        nbr.tasks.lsr_rxmt = None;
                    }
                }
                NbrAction::NeighborChange => {
                    self.iface.fsm(ism::Event::NeighborChange);
                }
                NbrAction::DeleteNeighbor => {
                    self.iface.neighbors.remove(&addr);
                }
                NbrAction::ClearLsdb => self.lsdb.clear(),
            }
        }
    }

    fn arm_dd_rxmt(&mut self, addr: Ipv4Addr) {
        let interval = self.iface.rxmt_interval();
        let tx = self.tx.clone();
        if let Some(nbr) = self.iface.neighbors.get_mut(&addr) {
            nbr.tasks.dd_rxmt = Some(IntervalTask::new(interval, false, move || {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(InstanceMsg::DdRxmt(addr));
                }
            }));
        }
    }

    fn arm_lsr_rxmt(&mut self, addr: Ipv4Addr) {
        let interval = self.iface.rxmt_interval();
        let tx = self.tx.clone();
        if let Some(nbr) = self.iface.neighbors.get_mut(&addr) {
            nbr.tasks.lsr_rxmt = Some(IntervalTask::new(interval, false, move || {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(InstanceMsg::LsrRxmt(addr));
                }
            }));
        }
    }

    fn arm_inactivity(&mut self, addr: Ipv4Addr) {
        let dead = Duration::from_secs(u64::from(self.iface.config.dead_interval()));
        let tx = self.tx.clone();
        if let Some(nbr) = self.iface.neighbors.get_mut(&addr) {
            match &mut nbr.tasks.inactivity {
                Some(timer) => timer.reset(Some(dead)),
                None => {
                    nbr.tasks.inactivity = Some(TimeoutTask::new(dead, move || {
                        let tx = tx.clone();
                        async move {
                            let _ = tx.send(InstanceMsg::InactivityTimer(addr));
                        }
                    }));
                }
            }
        }
    }

    async fn send(&self, dst: Ipv4Addr, packet: Packet) {
        Debug::PacketTx(&dst, &packet).log();
        if self.packet_display {
            Debug::PacketDisplay("tx", &dst, &packet).log();
        }
        let pkt_type = packet.pkt_type();
        let data = packet.encode();
        match self.socket.send_to(&data, dst).await {
            Ok(()) => self.stats.incr_send(pkt_type),
            Err(error) => Error::from(error).log(),
        }
    }

    fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            router_id: self.router_id,
            ifname: self.iface.config.name.clone(),
            ism_state: self.iface.state,
            neighbors: self
                .iface
                .neighbors
                .values()
                .map(|nbr| NeighborSnapshot {
                    router_id: nbr.router_id,
                    address: nbr.src,
                    state: nbr.state,
                })
                .collect(),
        }
    }
}

fn purge_allowed<'a>(neighbors: impl Iterator<Item = &'a neighbor::Neighbor>, key: &LsaKey) -> bool {
    !neighbors.into_iter().any(|nbr| {
        nbr.ls_rxmt_list.contains(key) || matches!(nbr.state, nsm::State::Exchange | nsm::State::Loading)
    })
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use ospfprobe_packet::lsa::{LsaKey, LsaType};

    use super::*;
    use crate::neighbor::Neighbor;

    fn key() -> LsaKey {
        LsaKey::new(
            LsaType(1),
            Ipv4Addr::new(1, 1, 1, 1),
            Ipv4Addr::new(1, 1, 1, 1),
        )
    }

    #[test]
    fn purge_allowed_when_no_neighbors() {
        assert!(purge_allowed(std::iter::empty(), &key()));
    }

    #[test]
    fn purge_blocked_while_neighbor_mid_sync() {
        let mut nbr = Neighbor::new(Ipv4Addr::new(2, 2, 2, 2), Ipv4Addr::new(10, 0, 0, 2));
        nbr.state = nsm::State::Exchange;
        assert!(!purge_allowed(std::iter::once(&nbr), &key()));
    }

    #[test]
    fn purge_blocked_while_key_on_rxmt_list() {
        let mut nbr = Neighbor::new(Ipv4Addr::new(2, 2, 2, 2), Ipv4Addr::new(10, 0, 0, 2));
        nbr.state = nsm::State::Full;
        nbr.ls_rxmt_list.push(key());
        assert!(!purge_allowed(std::iter::once(&nbr), &key()));
    }

    #[test]
    fn purge_allowed_once_full_and_off_rxmt_list() {
        let mut nbr = Neighbor::new(Ipv4Addr::new(2, 2, 2, 2), Ipv4Addr::new(10, 0, 0, 2));
        nbr.state = nsm::State::Full;
        assert!(purge_allowed(std::iter::once(&nbr), &key()));
    }
}
