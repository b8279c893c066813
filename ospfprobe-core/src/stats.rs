//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::atomic::{AtomicU64, Ordering};

use ospfprobe_packet::header::PacketType;
use serde::Serialize;

/// Process-wide packet counters, read by the query surface's `/stats` route.
#[derive(Debug, Default)]
pub struct Stats {
    total_recv_pkt: AtomicU64,
    total_handle_pkt: AtomicU64,
    total_send_pkt: AtomicU64,
    recv_hello: AtomicU64,
    recv_dd: AtomicU64,
    recv_lsr: AtomicU64,
    recv_lsu: AtomicU64,
    recv_lsack: AtomicU64,
    send_hello: AtomicU64,
    send_dd: AtomicU64,
    send_lsr: AtomicU64,
    send_lsu: AtomicU64,
    send_lsack: AtomicU64,
}

#[derive(Debug, Default, Serialize)]
pub struct StatsSnapshot {
    pub total_recv_pkt: u64,
    pub total_handle_pkt: u64,
    pub total_send_pkt: u64,
    pub detail_recv: StatsDetailRecv,
    pub detail_send: StatsDetailSend,
}

#[derive(Debug, Default, Serialize)]
pub struct StatsDetailRecv {
    pub recv_hello: u64,
    pub recv_dd: u64,
    pub recv_lsr: u64,
    pub recv_lsu: u64,
    pub recv_lsack: u64,
}

#[derive(Debug, Default, Serialize)]
pub struct StatsDetailSend {
    pub send_hello: u64,
    pub send_dd: u64,
    pub send_lsr: u64,
    pub send_lsu: u64,
    pub send_lsack: u64,
}

impl Stats {
    pub fn new() -> Stats {
        Stats::default()
    }

    pub fn incr_recv(&self, pkt_type: PacketType) {
        self.total_recv_pkt.fetch_add(1, Ordering::Relaxed);
        let counter = match pkt_type {
            PacketType::Hello => &self.recv_hello,
            PacketType::DbDesc => &self.recv_dd,
            PacketType::LsRequest => &self.recv_lsr,
            PacketType::LsUpdate => &self.recv_lsu,
            PacketType::LsAck => &self.recv_lsack,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_handled(&self) {
        self.total_handle_pkt.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_send(&self, pkt_type: PacketType) {
        self.total_send_pkt.fetch_add(1, Ordering::Relaxed);
        let counter = match pkt_type {
            PacketType::Hello => &self.send_hello,
            PacketType::DbDesc => &self.send_dd,
            PacketType::LsRequest => &self.send_lsr,
            PacketType::LsUpdate => &self.send_lsu,
            PacketType::LsAck => &self.send_lsack,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_recv_pkt: self.total_recv_pkt.load(Ordering::Relaxed),
            total_handle_pkt: self.total_handle_pkt.load(Ordering::Relaxed),
            total_send_pkt: self.total_send_pkt.load(Ordering::Relaxed),
            detail_recv: StatsDetailRecv {
                recv_hello: self.recv_hello.load(Ordering::Relaxed),
                recv_dd: self.recv_dd.load(Ordering::Relaxed),
                recv_lsr: self.recv_lsr.load(Ordering::Relaxed),
                recv_lsu: self.recv_lsu.load(Ordering::Relaxed),
                recv_lsack: self.recv_lsack.load(Ordering::Relaxed),
            },
            detail_send: StatsDetailSend {
                send_hello: self.send_hello.load(Ordering::Relaxed),
                send_dd: self.send_dd.load(Ordering::Relaxed),
                send_lsr: self.send_lsr.load(Ordering::Relaxed),
                send_lsu: self.send_lsu.load(Ordering::Relaxed),
                send_lsack: self.send_lsack.load(Ordering::Relaxed),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_type() {
        let stats = Stats::new();
        stats.incr_recv(PacketType::Hello);
        stats.incr_recv(PacketType::Hello);
        stats.incr_recv(PacketType::LsUpdate);
        let snap = stats.snapshot();
        assert_eq!(snap.total_recv_pkt, 3);
        assert_eq!(snap.detail_recv.recv_hello, 2);
        assert_eq!(snap.detail_recv.recv_lsu, 1);
    }
}
