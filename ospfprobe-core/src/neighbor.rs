//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;
use std::time::Duration;

use ospfprobe_packet::dbdesc::{DbDesc, DbDescFlags};
use ospfprobe_packet::header::PacketHdr;
use ospfprobe_packet::lsa::LsaKey;
use ospfprobe_packet::lsrequest::LsRequest;
use ospfprobe_packet::options::Options;

use crate::debug::Debug;
use crate::task::{IntervalTask, TimeoutTask};

/// Maximum number of LSA-request headers packed into a single LS Request
/// (§4.7).
pub const LSR_MAX_PER_PACKET: usize = 100;

/// Neighbor state machine.
pub mod nsm {
    #[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
    #[derive(serde::Serialize)]
    pub enum State {
        #[default]
        Down,
        Attempt,
        Init,
        TwoWay,
        ExStart,
        Exchange,
        Loading,
        Full,
    }

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub enum Event {
        HelloReceived,
        TwoWayReceived,
        OneWayReceived,
        NegotiationDone,
        ExchangeDone,
        LoadingDone,
        BadLSReq,
        SeqNumberMismatch,
        KillNbr,
        InactivityTimer,
        LLDown,
        AdjOk,
    }
}

use nsm::{Event, State};

/// A snapshot of the last DD packet received from this neighbor, kept to
/// detect duplicates (§4.7 step 6/7).
#[derive(Clone, Debug)]
pub struct LastDbDesc {
    pub flags: DbDescFlags,
    pub dd_seq_no: u32,
    pub options: Options,
}

/// Side effects the caller (the receiver task / timer callbacks) must carry
/// out after an NSM transition. Kept as plain data so the FSM itself stays a
/// pure `match (state, event)` function.
#[derive(Debug)]
pub enum NbrAction {
    SendDbDesc(DbDesc),
    SendLsRequest(Vec<LsaKey>),
    StartInactivityTimer,
    StopTimers,
    NeighborChange,
    DeleteNeighbor,
    /// Empty the area LSDB. Only ever emitted alongside `DeleteNeighbor`:
    /// the probe's one adjacency tearing down for good (§3, §8 Inactivity
    /// scenario), not a SeqNumberMismatch/BadLSReq resync.
    ClearLsdb,
}

#[derive(Debug)]
pub struct Neighbor {
    pub router_id: Ipv4Addr,
    pub src: Ipv4Addr,
    pub state: State,
    /// Whether the link warrants adjacency with this neighbor (P2P, or the
    /// neighbor is DR/BDR on broadcast) — set by the caller from
    /// [`crate::interface::Interface::adjacency_warranted`] before every
    /// `fsm(Event::TwoWayReceived)` call, since the NSM itself has no view
    /// of the enclosing interface's link type or learned DR/BDR.
    pub adj_warranted: bool,
    pub dd_seq_no: u32,
    pub is_master: bool,
    pub mtu: u16,
    pub options: Options,
    pub last_rcvd_dd: Option<LastDbDesc>,
    pub last_sent_dd: Option<DbDesc>,
    /// Headers requested but not yet satisfied, in request order.
    pub ls_request_list: Vec<LsaKey>,
    /// Keys pending (re)transmission to this neighbor via flooding. Always
    /// empty in steady state since the probe never originates or re-floods
    /// (kept for architectural parity with a multi-neighbor flood engine).
    pub ls_rxmt_list: Vec<LsaKey>,
    pub tasks: NeighborTasks,
}

#[derive(Default)]
pub struct NeighborTasks {
    pub inactivity: Option<TimeoutTask>,
    pub dd_rxmt: Option<IntervalTask>,
    pub lsr_rxmt: Option<IntervalTask>,
}

impl std::fmt::Debug for NeighborTasks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NeighborTasks")
            .field("inactivity", &self.inactivity.is_some())
            .field("dd_rxmt", &self.dd_rxmt.is_some())
            .field("lsr_rxmt", &self.lsr_rxmt.is_some())
            .finish()
    }
}

impl Neighbor {
    pub fn new(router_id: Ipv4Addr, src: Ipv4Addr) -> Neighbor {
        Debug::NeighborCreate(router_id).log();

        Neighbor {
            router_id,
            src,
            state: State::Down,
            adj_warranted: false,
            dd_seq_no: 0,
            is_master: false,
            mtu: 0,
            options: Options::empty(),
            last_rcvd_dd: None,
            last_sent_dd: None,
            ls_request_list: Vec::new(),
            ls_rxmt_list: Vec::new(),
            tasks: NeighborTasks::default(),
        }
    }

    /// Drives the NSM per §4.5. Returns the actions the caller must execute;
    /// unrecognized (state, event) pairs are no-ops, matching the RFC's
    /// "event ignored in this state" convention.
    pub fn fsm(&mut self, event: Event) -> Vec<NbrAction> {
        Debug::NsmEvent(self.router_id, &self.state, &event).log();

        let old_state = self.state;
        let mut actions = Vec::new();

        match (self.state, event) {
            (_, Event::HelloReceived) => {
                actions.push(NbrAction::StartInactivityTimer);
                if self.state == State::Down {
                    self.state = State::Init;
                }
            }
            (State::Down | State::Attempt, Event::TwoWayReceived) => {
                self.state = State::TwoWay;
            }
            (State::Init, Event::TwoWayReceived) if self.adj_warranted => {
                self.start_exstart(&mut actions);
            }
            (State::Init, Event::TwoWayReceived) => {
                self.state = State::TwoWay;
            }
            (_, Event::OneWayReceived) => {
                self.reset(&mut actions);
                self.state = State::Init;
            }
            (State::ExStart, Event::NegotiationDone) => {
                self.state = State::Exchange;
            }
            (State::Exchange, Event::ExchangeDone) => {
                if self.ls_request_list.is_empty() {
                    self.state = State::Full;
                    actions.push(NbrAction::StopTimers);
                } else {
                    self.state = State::Loading;
                    self.tasks.dd_rxmt = None;
                    actions.push(NbrAction::SendLsRequest(self.next_ls_request()));
                }
            }
            (State::Loading, Event::LoadingDone) => {
                self.state = State::Full;
                actions.push(NbrAction::StopTimers);
            }
            (
                State::ExStart | State::Exchange | State::Loading | State::Full,
                Event::SeqNumberMismatch | Event::BadLSReq,
            ) => {
                self.reset(&mut actions);
                self.start_exstart(&mut actions);
            }
            (_, Event::KillNbr | Event::LLDown | Event::InactivityTimer) => {
                self.reset(&mut actions);
                self.state = State::Down;
                actions.push(NbrAction::NeighborChange);
                actions.push(NbrAction::DeleteNeighbor);
                actions.push(NbrAction::ClearLsdb);
            }
            (_, Event::AdjOk) => {}
            _ => {}
        }

        if self.state != old_state {
            Debug::NsmTransition(self.router_id, &old_state, &self.state).log();
        }

        actions
    }

    fn start_exstart(&mut self, actions: &mut Vec<NbrAction>) {
        self.state = State::ExStart;
        self.dd_seq_no = now_seconds();
        let dd = DbDesc {
            hdr: PacketHdr::new(
                ospfprobe_packet::header::PacketType::DbDesc,
                Ipv4Addr::UNSPECIFIED,
                Ipv4Addr::UNSPECIFIED,
            ),
            mtu: 0,
            options: Options::empty(),
            dd_flags: DbDescFlags::I | DbDescFlags::M | DbDescFlags::MS,
            dd_seq_no: self.dd_seq_no,
            lsa_hdrs: Vec::new(),
        };
        self.last_sent_dd = Some(dd.clone());
        actions.push(NbrAction::SendDbDesc(dd));
    }

    fn reset(&mut self, actions: &mut Vec<NbrAction>) {
        self.ls_request_list.clear();
        self.ls_rxmt_list.clear();
        self.last_rcvd_dd = None;
        self.last_sent_dd = None;
        self.tasks.dd_rxmt = None;
        self.tasks.lsr_rxmt = None;
        actions.push(NbrAction::StopTimers);
    }

    /// Pops up to [`LSR_MAX_PER_PACKET`] keys off the front of the request
    /// list to pack into the next LS Request.
    pub fn next_ls_request(&self) -> Vec<LsaKey> {
        self.ls_request_list
            .iter()
            .take(LSR_MAX_PER_PACKET)
            .copied()
            .collect()
    }

    /// Removes `key` from the request list. Returns the actions to run if
    /// the list just became empty (§4.7 LSR retransmit teardown, §4.8 step
    /// 5 "new or newer" handling).
    pub fn ls_request_satisfied(&mut self, key: &LsaKey) -> Vec<NbrAction> {
        self.ls_request_list.retain(|k| k != key);
        if self.ls_request_list.is_empty() && self.state == State::Loading {
            return self.fsm(Event::LoadingDone);
        }
        Vec::new()
    }

    pub fn ls_rxmt_remove(&mut self, key: &LsaKey) {
        self.ls_rxmt_list.retain(|k| k != key);
    }

    pub fn dead_interval(&self, hello_interval: u16) -> Duration {
        Duration::from_secs(u64::from(hello_interval) * 4)
    }
}

fn now_seconds() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// Generates the LS Request packed from `entries`, per §4.7.
pub fn build_ls_request(hdr: PacketHdr, entries: Vec<LsaKey>) -> LsRequest {
    LsRequest { hdr, entries }
}

impl Neighbor {
    /// Applies the full §4.7 DD acceptance tests, in order, to an incoming
    /// DD. `our_rid`/`our_mtu` identify the probe; `lsdb` resolves the
    /// LSR-discovery "newer" comparisons. Returns the NSM actions to run, or
    /// an error for the one case the RFC treats as fatal to the exchange
    /// (a type-5 header while in a stub area).
    pub async fn process_dbdesc(
        &mut self,
        our_rid: Ipv4Addr,
        our_mtu: u16,
        our_options: Options,
        dbdesc: &DbDesc,
        lsdb: &crate::lsdb::LsdbHandle,
    ) -> Result<Vec<NbrAction>, &'static str> {
        // Step 1: MTU mismatch.
        if dbdesc.mtu > our_mtu {
            return Ok(Vec::new());
        }

        // Step 2.
        if matches!(self.state, State::Down | State::Attempt) {
            return Ok(Vec::new());
        }

        // Step 3.
        if self.state == State::Init {
            return Ok(self.fsm(Event::TwoWayReceived));
        }

        // Step 4.
        if self.state == State::TwoWay {
            return Ok(Vec::new());
        }

        // Step 5: ExStart negotiation.
        if self.state == State::ExStart {
            let init_master = dbdesc.dd_flags.contains(DbDescFlags::MS | DbDescFlags::I | DbDescFlags::M);
            let is_master_neg = !dbdesc.dd_flags.contains(DbDescFlags::MS)
                && !dbdesc.dd_flags.contains(DbDescFlags::I);

            if init_master && dbdesc.hdr.router_id > our_rid {
                self.is_master = false;
                self.dd_seq_no = dbdesc.dd_seq_no;
                self.mtu = dbdesc.mtu;
                self.options = dbdesc.options;
                return Ok(self.fsm(Event::NegotiationDone));
            } else if is_master_neg && dbdesc.hdr.router_id < our_rid {
                self.is_master = true;
                self.dd_seq_no = self.dd_seq_no.wrapping_add(1);
                self.mtu = dbdesc.mtu;
                self.options = dbdesc.options;
                let mut actions = self.fsm(Event::NegotiationDone);
                if !dbdesc.dd_flags.contains(DbDescFlags::M) {
                    actions.extend(self.fsm(Event::ExchangeDone));
                }
                return Ok(actions);
            }
            return Ok(Vec::new());
        }

        // Step 6: Exchange.
        if self.state == State::Exchange {
            if self.is_duplicate(dbdesc) {
                return Ok(if self.is_master {
                    Vec::new()
                } else if let Some(dd) = self.last_sent_dd.clone() {
                    vec![NbrAction::SendDbDesc(dd)]
                } else {
                    Vec::new()
                });
            }

            let role_mismatch = dbdesc.dd_flags.contains(DbDescFlags::MS) == self.is_master;
            if role_mismatch || dbdesc.dd_flags.contains(DbDescFlags::I) {
                return Ok(self.fsm(Event::SeqNumberMismatch));
            }
            if dbdesc.options != self.options {
                return Ok(self.fsm(Event::SeqNumberMismatch));
            }

            for hdr in &dbdesc.lsa_hdrs {
                if hdr.lsa_type.type_code() == Some(ospfprobe_packet::lsa::LsaTypeCode::AsExternal)
                    && !our_options.contains(Options::E)
                {
                    return Err("type-5 LSA header received in a stub area");
                }
            }

            let mut requested = Vec::new();
            for hdr in &dbdesc.lsa_hdrs {
                let newer = match lsdb.compare(*hdr).await {
                    Some(ordering) => ordering == std::cmp::Ordering::Greater,
                    None => true,
                };
                if newer {
                    requested.push(hdr.key());
                }
            }
            self.ls_request_list.extend(requested);

            self.remember(dbdesc);

            let mut actions = Vec::new();
            if !dbdesc.dd_flags.contains(DbDescFlags::M) {
                if self.is_master {
                    self.dd_seq_no = self.dd_seq_no.wrapping_add(1);
                } else {
                    self.dd_seq_no = dbdesc.dd_seq_no;
                    actions.push(NbrAction::SendDbDesc(self.probe_dd()));
                }
                actions.extend(self.fsm(Event::ExchangeDone));
            } else {
                if self.is_master {
                    self.dd_seq_no = self.dd_seq_no.wrapping_add(1);
                } else {
                    self.dd_seq_no = dbdesc.dd_seq_no;
                }
                actions.push(NbrAction::SendDbDesc(self.probe_dd()));
            }
            return Ok(actions);
        }

        // Step 7: Loading / Full.
        if matches!(self.state, State::Loading | State::Full) {
            if self.is_duplicate(dbdesc) && !self.is_master {
                if let Some(dd) = self.last_sent_dd.clone() {
                    return Ok(vec![NbrAction::SendDbDesc(dd)]);
                }
                return Ok(Vec::new());
            }
            if dbdesc.dd_flags.contains(DbDescFlags::I) || dbdesc.options != self.options {
                return Ok(self.fsm(Event::SeqNumberMismatch));
            }
        }

        Ok(Vec::new())
    }

    fn is_duplicate(&self, dbdesc: &DbDesc) -> bool {
        match &self.last_rcvd_dd {
            Some(last) => {
                last.dd_seq_no == dbdesc.dd_seq_no
                    && last.flags == dbdesc.dd_flags
                    && last.options == dbdesc.options
            }
            None => false,
        }
    }

    fn remember(&mut self, dbdesc: &DbDesc) {
        self.last_rcvd_dd = Some(LastDbDesc {
            flags: dbdesc.dd_flags,
            dd_seq_no: dbdesc.dd_seq_no,
            options: dbdesc.options,
        });
    }

    /// The probe's own DD: `M=0` and an empty header list always — it has
    /// nothing of its own to advertise (§4.7 DD emission, no-origination
    /// invariant).
    fn probe_dd(&self) -> DbDesc {
        let mut flags = DbDescFlags::empty();
        if self.is_master {
            flags.insert(DbDescFlags::MS);
        }
        DbDesc {
            hdr: PacketHdr::new(
                ospfprobe_packet::header::PacketType::DbDesc,
                Ipv4Addr::UNSPECIFIED,
                Ipv4Addr::UNSPECIFIED,
            ),
            mtu: self.mtu,
            options: self.options,
            dd_flags: flags,
            dd_seq_no: self.dd_seq_no,
            lsa_hdrs: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_received_starts_init() {
        let mut nbr = Neighbor::new(Ipv4Addr::new(2, 2, 2, 2), Ipv4Addr::new(10, 0, 0, 2));
        nbr.fsm(Event::HelloReceived);
        assert_eq!(nbr.state, State::Init);
    }

    #[test]
    fn two_way_to_exstart_sends_dd() {
        let mut nbr = Neighbor::new(Ipv4Addr::new(2, 2, 2, 2), Ipv4Addr::new(10, 0, 0, 2));
        nbr.state = State::Init;
        nbr.adj_warranted = true;
        let actions = nbr.fsm(Event::TwoWayReceived);
        assert_eq!(nbr.state, State::ExStart);
        assert!(matches!(actions[0], NbrAction::SendDbDesc(_)));
    }

    #[test]
    fn two_way_without_adjacency_stays_two_way() {
        let mut nbr = Neighbor::new(Ipv4Addr::new(2, 2, 2, 2), Ipv4Addr::new(10, 0, 0, 2));
        nbr.state = State::Init;
        let actions = nbr.fsm(Event::TwoWayReceived);
        assert_eq!(nbr.state, State::TwoWay);
        assert!(actions.iter().all(|a| !matches!(a, NbrAction::SendDbDesc(_))));
    }

    #[test]
    fn inactivity_resets_to_down() {
        let mut nbr = Neighbor::new(Ipv4Addr::new(2, 2, 2, 2), Ipv4Addr::new(10, 0, 0, 2));
        nbr.state = State::Full;
        nbr.ls_request_list.push(LsaKey::new(
            ospfprobe_packet::lsa::LsaType::from(ospfprobe_packet::lsa::LsaTypeCode::Router),
            Ipv4Addr::new(2, 2, 2, 2),
            Ipv4Addr::new(2, 2, 2, 2),
        ));
        let actions = nbr.fsm(Event::InactivityTimer);
        assert_eq!(nbr.state, State::Down);
        assert!(nbr.ls_request_list.is_empty());
        assert!(actions.iter().any(|a| matches!(a, NbrAction::DeleteNeighbor)));
        assert!(actions.iter().any(|a| matches!(a, NbrAction::ClearLsdb)));
    }

    #[test]
    fn seq_number_mismatch_does_not_clear_lsdb() {
        let mut nbr = Neighbor::new(Ipv4Addr::new(2, 2, 2, 2), Ipv4Addr::new(10, 0, 0, 2));
        nbr.state = State::Exchange;
        let actions = nbr.fsm(Event::SeqNumberMismatch);
        assert_eq!(nbr.state, State::ExStart);
        assert!(!actions.iter().any(|a| matches!(a, NbrAction::ClearLsdb)));
    }
}
