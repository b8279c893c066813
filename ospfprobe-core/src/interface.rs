//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeSet, HashMap};
use std::net::Ipv4Addr;
use std::time::Duration;

use ospfprobe_packet::header::PacketHdr;
use ospfprobe_packet::hello::Hello;
use ospfprobe_packet::options::Options;

use crate::debug::Debug;
use crate::error::InterfaceCfgError;
use crate::neighbor::{nsm, Neighbor};
use crate::task::{IntervalTask, TimeoutTask};

/// Interface state machine.
pub mod ism {
    #[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
    #[derive(serde::Serialize)]
    pub enum State {
        #[default]
        Down,
        Loopback,
        Waiting,
        PointToPoint,
        DrOther,
        Backup,
        Dr,
    }

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub enum Event {
        InterfaceUp,
        WaitTimer,
        BackupSeen,
        NeighborChange,
        LoopInd,
        UnloopInd,
        InterfaceDown,
    }
}

use ism::{Event, State};

/// Point-to-point vs. broadcast affects whether the interface ever waits
/// for a DR election to settle and whether the netmask check applies to
/// incoming Hellos (§4.9).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LinkType {
    Broadcast,
    PointToPoint,
}

/// Static configuration, fixed for the lifetime of the process (§6 — no
/// reload).
#[derive(Clone, Debug)]
pub struct InterfaceConfig {
    pub name: String,
    pub router_id: Ipv4Addr,
    pub area_id: Ipv4Addr,
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub mtu: u16,
    pub link_type: LinkType,
    pub hello_interval: u16,
    pub rxmt_interval: u16,
    pub options: Options,
}

impl InterfaceConfig {
    pub fn dead_interval(&self) -> u32 {
        u32::from(self.hello_interval) * 4
    }
}

#[derive(Default)]
pub struct InterfaceTasks {
    pub hello: Option<IntervalTask>,
    pub wait_timer: Option<TimeoutTask>,
    pub age_sweep: Option<IntervalTask>,
}

impl std::fmt::Debug for InterfaceTasks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterfaceTasks")
            .field("hello", &self.hello.is_some())
            .field("wait_timer", &self.wait_timer.is_some())
            .field("age_sweep", &self.age_sweep.is_some())
            .finish()
    }
}

/// The probe never participates in DR/BDR election (priority is fixed to
/// 0): this tracks what it has *learned* from Hellos so its own Hellos can
/// echo a consistent DR/BDR field.
#[derive(Clone, Copy, Debug, Default)]
pub struct LearnedDr {
    pub dr: Option<Ipv4Addr>,
    pub bdr: Option<Ipv4Addr>,
}

#[derive(Debug)]
pub struct Interface {
    pub config: InterfaceConfig,
    pub state: State,
    pub learned: LearnedDr,
    pub neighbors: HashMap<Ipv4Addr, Neighbor>,
    pub tasks: InterfaceTasks,
}

impl Interface {
    pub fn new(config: InterfaceConfig) -> Interface {
        Interface {
            config,
            state: State::Down,
            learned: LearnedDr::default(),
            neighbors: HashMap::new(),
            tasks: InterfaceTasks::default(),
        }
    }

    /// Drives the ISM per §4.4. The probe never transitions into `Dr` or
    /// `Backup` — those states exist only to make the enum's shape match
    /// the RFC's; nothing in this FSM ever produces them.
    pub fn fsm(&mut self, event: Event) {
        Debug::IsmEvent(&self.state, &event).log();
        let old_state = self.state;

        match (self.state, event) {
            (State::Down, Event::InterfaceUp) => {
                self.state = match self.config.link_type {
                    LinkType::PointToPoint => State::PointToPoint,
                    LinkType::Broadcast => State::Waiting,
                };
            }
            (State::Waiting, Event::WaitTimer | Event::BackupSeen) => {
                self.state = State::DrOther;
                self.tasks.wait_timer = None;
            }
            (_, Event::NeighborChange) if self.state != State::Down => {
                self.state = State::DrOther;
            }
            (_, Event::LoopInd) => {
                self.state = State::Loopback;
            }
            (State::Loopback, Event::UnloopInd) => {
                self.state = State::Down;
            }
            (_, Event::InterfaceDown) => {
                self.state = State::Down;
                self.tasks = InterfaceTasks::default();
                self.neighbors.clear();
            }
            _ => {}
        }

        if self.state != old_state {
            Debug::IsmTransition(&old_state, &self.state).log();
        }
    }

    pub fn is_down(&self) -> bool {
        self.state == State::Down
    }

    /// Builds the Hello this interface should transmit: priority always 0,
    /// DR/BDR mirror what has been learned from the wire, neighbor list is
    /// every Router ID currently in any NSM state above Down (§4.4 Hello
    /// timer).
    pub fn generate_hello(&self) -> Hello {
        let neighbors: BTreeSet<Ipv4Addr> = self
            .neighbors
            .values()
            .filter(|nbr| nbr.state != nsm::State::Down)
            .map(|nbr| nbr.router_id)
            .collect();

        Hello {
            hdr: PacketHdr::new(
                ospfprobe_packet::header::PacketType::Hello,
                self.config.router_id,
                self.config.area_id,
            ),
            network_mask: self.config.netmask,
            hello_interval: self.config.hello_interval,
            options: self.config.options,
            priority: 0,
            dead_interval: self.config.dead_interval(),
            dr: self.learned.dr,
            bdr: self.learned.bdr,
            neighbors,
        }
    }

    /// Checks required Hello fields per §4.9. On mismatch the Hello is
    /// dropped and a typed warning logged by the caller.
    pub fn validate_hello(&self, hello: &Hello) -> Result<(), InterfaceCfgError> {
        if hello.hdr.area_id != self.config.area_id {
            return Err(InterfaceCfgError::AreaIdMismatch(hello.hdr.area_id, self.config.area_id));
        }
        if self.config.link_type == LinkType::Broadcast && hello.network_mask != self.config.netmask
        {
            return Err(InterfaceCfgError::NetmaskMismatch(hello.network_mask, self.config.netmask));
        }
        if hello.hello_interval != self.config.hello_interval {
            return Err(InterfaceCfgError::HelloIntervalMismatch(
                hello.hello_interval,
                self.config.hello_interval,
            ));
        }
        if hello.dead_interval != self.config.dead_interval() {
            return Err(InterfaceCfgError::DeadIntervalMismatch(
                hello.dead_interval,
                self.config.dead_interval(),
            ));
        }
        let e_mismatch = hello.options.contains(Options::E) != self.config.options.contains(Options::E);
        if e_mismatch {
            return Err(InterfaceCfgError::ExternalRoutingCapabilityMismatch(
                hello.options.contains(Options::E),
            ));
        }
        let np_mismatch = hello.options.contains(Options::NP) != self.config.options.contains(Options::NP);
        if np_mismatch {
            return Err(InterfaceCfgError::NssaCapabilityMismatch(hello.options.contains(Options::NP)));
        }
        Ok(())
    }

    /// Whether an adjacency is warranted with a neighbor reporting TwoWay,
    /// per §4.5: always on P2P, or if the neighbor is DR/BDR on broadcast.
    pub fn adjacency_warranted(&self, neighbor_addr: Ipv4Addr) -> bool {
        match self.config.link_type {
            LinkType::PointToPoint => true,
            LinkType::Broadcast => {
                self.learned.dr == Some(neighbor_addr) || self.learned.bdr == Some(neighbor_addr)
            }
        }
    }

    pub fn hello_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.config.hello_interval))
    }

    pub fn rxmt_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.config.rxmt_interval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> InterfaceConfig {
        InterfaceConfig {
            name: "eth0".to_string(),
            router_id: Ipv4Addr::new(1, 1, 1, 1),
            area_id: Ipv4Addr::new(0, 0, 0, 0),
            address: Ipv4Addr::new(10, 0, 0, 1),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            mtu: 1500,
            link_type: LinkType::PointToPoint,
            hello_interval: 10,
            rxmt_interval: 5,
            options: Options::E,
        }
    }

    #[test]
    fn interface_up_on_p2p_goes_straight_to_point_to_point() {
        let mut iface = Interface::new(config());
        iface.fsm(Event::InterfaceUp);
        assert_eq!(iface.state, State::PointToPoint);
    }

    #[test]
    fn interface_up_on_broadcast_waits() {
        let mut cfg = config();
        cfg.link_type = LinkType::Broadcast;
        let mut iface = Interface::new(cfg);
        iface.fsm(Event::InterfaceUp);
        assert_eq!(iface.state, State::Waiting);
    }

    #[test]
    fn interface_down_clears_neighbors() {
        let mut iface = Interface::new(config());
        iface.fsm(Event::InterfaceUp);
        iface
            .neighbors
            .insert(Ipv4Addr::new(2, 2, 2, 2), Neighbor::new(Ipv4Addr::new(2, 2, 2, 2), Ipv4Addr::new(10, 0, 0, 2)));
        iface.fsm(Event::InterfaceDown);
        assert_eq!(iface.state, State::Down);
        assert!(iface.neighbors.is_empty());
    }

    #[test]
    fn hello_carries_priority_zero() {
        let iface = Interface::new(config());
        let hello = iface.generate_hello();
        assert_eq!(hello.priority, 0);
    }

    #[test]
    fn validate_hello_accepts_matching_hello() {
        let iface = Interface::new(config());
        let hello = iface.generate_hello();
        assert!(iface.validate_hello(&hello).is_ok());
    }

    #[test]
    fn validate_hello_rejects_e_bit_mismatch() {
        let iface = Interface::new(config());
        let mut hello = iface.generate_hello();
        hello.options.remove(Options::E);
        assert!(matches!(
            iface.validate_hello(&hello),
            Err(InterfaceCfgError::ExternalRoutingCapabilityMismatch(false))
        ));
    }

    #[test]
    fn validate_hello_rejects_np_bit_mismatch() {
        let iface = Interface::new(config());
        let mut hello = iface.generate_hello();
        hello.options.insert(Options::NP);
        assert!(matches!(
            iface.validate_hello(&hello),
            Err(InterfaceCfgError::NssaCapabilityMismatch(true))
        ));
    }
}
