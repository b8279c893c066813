//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Instant;

use ospfprobe_packet::lsa::{Lsa, LsaHdr, LsaKey, LSA_MAX_AGE, LSA_MIN_AGE_DIFF, LSA_MIN_ARRIVAL};
use tokio::sync::{mpsc, oneshot};

use crate::debug::Debug;
use crate::task::Task;

/// The area's Link-State Database. Owned exclusively by the LSU worker task
/// (§9); every other task reaches it only through message-passing.
#[derive(Debug, Default)]
pub struct Lsdb {
    entries: HashMap<LsaKey, Lsa>,
}

impl Lsdb {
    pub fn new() -> Lsdb {
        Lsdb::default()
    }

    pub fn get(&self, key: &LsaKey) -> Option<&Lsa> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &LsaKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lsa> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Installs `lsa`, replacing any existing copy for the same key. A
    /// MaxAge LSA is never stored: an existing copy is removed instead
    /// (§4.6 purge semantics).
    pub fn install(&mut self, mut lsa: Lsa) {
        lsa.base_time = Some(Instant::now());
        let key = lsa.hdr.key();
        if lsa.hdr.is_maxage() {
            if self.entries.remove(&key).is_some() {
                Debug::LsaPurge(&lsa.hdr).log();
            }
            return;
        }
        Debug::LsaInstall(&lsa.hdr).log();
        self.entries.insert(key, lsa);
    }

    pub fn remove(&mut self, key: &LsaKey) -> Option<Lsa> {
        self.entries.remove(key)
    }

    /// Drops every record. Called when the probe's one adjacency tears down
    /// for good (§3: an LSA record is destroyed "when adjacency resets").
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the MaxAge entries eligible for purge: effective age at or
    /// beyond MaxAge, DNA clear. Purge itself is gated by retransmission
    /// list state the caller is responsible for checking (§4.4).
    pub fn maxage_candidates(&self) -> Vec<LsaKey> {
        self.entries
            .values()
            .filter(|lsa| lsa.age() >= LSA_MAX_AGE)
            .map(|lsa| lsa.hdr.key())
            .collect()
    }
}

/// Checks whether `key`'s stored copy was installed less than MinLSArrival
/// seconds ago (RFC 2328 §13, step 5a).
pub fn min_arrival_check(lsdb: &Lsdb, key: &LsaKey) -> bool {
    match lsdb.get(key).and_then(|lsa| lsa.base_time) {
        Some(base_time) => base_time.elapsed().as_secs() < u64::from(LSA_MIN_ARRIVAL),
        None => false,
    }
}

/// Compares which LSA is more recent per RFC 2328 §13.1.
///
/// Returns `Ordering::Greater` when `a` is more recent, `Ordering::Less`
/// when `b` is more recent, `Ordering::Equal` when they are the same
/// instance for flooding purposes.
pub fn lsa_compare(a: &LsaHdr, b: &LsaHdr) -> Ordering {
    let a_seq_no = a.seq_no as i32;
    let b_seq_no = b.seq_no as i32;
    let cmp = a_seq_no.cmp(&b_seq_no);
    if cmp != Ordering::Equal {
        return cmp;
    }

    let cmp = a.cksum.cmp(&b.cksum);
    if cmp != Ordering::Equal {
        return cmp;
    }

    if a.is_maxage() && !b.is_maxage() {
        return Ordering::Greater;
    } else if !a.is_maxage() && b.is_maxage() {
        return Ordering::Less;
    }

    if a.age.abs_diff(b.age) > LSA_MIN_AGE_DIFF {
        return b.age.cmp(&a.age);
    }

    Ordering::Equal
}

// ===== actor =====

/// Requests the LSDB owner task accepts. The owner task is the only code
/// that ever holds `&mut Lsdb` (§9): every other task reaches it through a
/// [`LsdbHandle`].
enum LsdbMsg {
    Install(Lsa),
    Remove(LsaKey),
    Clear,
    Get(LsaKey, oneshot::Sender<Option<Lsa>>),
    Contains(LsaKey, oneshot::Sender<bool>),
    MinArrival(LsaKey, oneshot::Sender<bool>),
    Compare(LsaKey, LsaHdr, oneshot::Sender<Option<Ordering>>),
    Snapshot(oneshot::Sender<Vec<Lsa>>),
    MaxAgeSweep(oneshot::Sender<Vec<LsaKey>>),
}

/// A cheaply-cloneable handle to the LSDB owner task.
#[derive(Clone)]
pub struct LsdbHandle {
    tx: mpsc::UnboundedSender<LsdbMsg>,
}

impl LsdbHandle {
    pub fn install(&self, lsa: Lsa) {
        let _ = self.tx.send(LsdbMsg::Install(lsa));
    }

    pub fn remove(&self, key: LsaKey) {
        let _ = self.tx.send(LsdbMsg::Remove(key));
    }

    /// Drops every record, for use when the probe's one adjacency tears
    /// down for good (§3, §8 Inactivity scenario).
    pub fn clear(&self) {
        let _ = self.tx.send(LsdbMsg::Clear);
    }

    pub async fn get(&self, key: LsaKey) -> Option<Lsa> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(LsdbMsg::Get(key, reply_tx)).is_err() {
            return None;
        }
        reply_rx.await.ok().flatten()
    }

    pub async fn contains(&self, key: LsaKey) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(LsdbMsg::Contains(key, reply_tx)).is_err() {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    /// True if the stored copy for `key` was installed less than
    /// MinLSArrival seconds ago.
    pub async fn min_arrival_check(&self, key: LsaKey) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(LsdbMsg::MinArrival(key, reply_tx)).is_err() {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    /// Compares `hdr` against the stored copy for its key, if any.
    pub async fn compare(&self, hdr: LsaHdr) -> Option<Ordering> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(LsdbMsg::Compare(hdr.key(), hdr, reply_tx)).is_err() {
            return None;
        }
        reply_rx.await.ok().flatten()
    }

    pub async fn snapshot(&self) -> Vec<Lsa> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(LsdbMsg::Snapshot(reply_tx)).is_err() {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }

    /// Returns the keys of records whose effective age is at or beyond
    /// MaxAge. Purge is decided by the caller (§4.4) and issued back via
    /// [`LsdbHandle::remove`].
    pub async fn maxage_sweep(&self) -> Vec<LsaKey> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(LsdbMsg::MaxAgeSweep(reply_tx)).is_err() {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }
}

/// Spawns the LSDB owner task and returns a handle to it.
pub fn spawn() -> (LsdbHandle, Task<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<LsdbMsg>();

    let task = Task::spawn(async move {
        let mut lsdb = Lsdb::new();
        while let Some(msg) = rx.recv().await {
            match msg {
                LsdbMsg::Install(lsa) => lsdb.install(lsa),
                LsdbMsg::Remove(key) => {
                    lsdb.remove(&key);
                }
                LsdbMsg::Clear => lsdb.clear(),
                LsdbMsg::Get(key, reply) => {
                    let _ = reply.send(lsdb.get(&key).cloned());
                }
                LsdbMsg::Contains(key, reply) => {
                    let _ = reply.send(lsdb.contains(&key));
                }
                LsdbMsg::MinArrival(key, reply) => {
                    let _ = reply.send(min_arrival_check(&lsdb, &key));
                }
                LsdbMsg::Compare(key, hdr, reply) => {
                    let ordering = lsdb.get(&key).map(|existing| lsa_compare(&hdr, &existing.hdr));
                    let _ = reply.send(ordering);
                }
                LsdbMsg::Snapshot(reply) => {
                    let _ = reply.send(lsdb.iter().cloned().collect());
                }
                LsdbMsg::MaxAgeSweep(reply) => {
                    let _ = reply.send(lsdb.maxage_candidates());
                }
            }
        }
    });

    (LsdbHandle { tx }, task)
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use ospfprobe_packet::lsa::router::{LsaRouter, LsaRouterFlags};
    use ospfprobe_packet::lsa::{LsaBody, LsaType, LsaTypeCode, LSA_INIT_SEQ_NO};
    use ospfprobe_packet::options::Options;

    use super::*;

    fn hdr(seq_no: u32, cksum: u16, age: u16) -> LsaHdr {
        LsaHdr {
            age,
            options: Options::E,
            lsa_type: LsaType::from(LsaTypeCode::Router),
            lsa_id: Ipv4Addr::new(1, 1, 1, 1),
            adv_rtr: Ipv4Addr::new(1, 1, 1, 1),
            seq_no,
            cksum,
            length: 24,
        }
    }

    #[test]
    fn newer_seq_no_wins() {
        let a = hdr(LSA_INIT_SEQ_NO + 1, 100, 10);
        let b = hdr(LSA_INIT_SEQ_NO, 100, 10);
        assert_eq!(lsa_compare(&a, &b), Ordering::Greater);
        assert_eq!(lsa_compare(&b, &a), Ordering::Less);
    }

    #[test]
    fn equal_when_close_in_age() {
        let a = hdr(LSA_INIT_SEQ_NO, 100, 100);
        let b = hdr(LSA_INIT_SEQ_NO, 100, 105);
        assert_eq!(lsa_compare(&a, &b), Ordering::Equal);
    }

    #[test]
    fn lower_age_wins_past_threshold() {
        let a = hdr(LSA_INIT_SEQ_NO, 100, 10);
        let b = hdr(LSA_INIT_SEQ_NO, 100, 1000);
        assert_eq!(lsa_compare(&a, &b), Ordering::Greater);
    }

    #[test]
    fn maxage_install_purges_existing() {
        let mut lsdb = Lsdb::new();
        let body = LsaBody::Router(LsaRouter {
            flags: LsaRouterFlags::empty(),
            links: vec![],
        });
        let mut lsa = Lsa {
            raw: Default::default(),
            hdr: hdr(LSA_INIT_SEQ_NO, 0, 10),
            body,
            base_time: None,
        };
        let key = lsa.hdr.key();
        lsdb.install(lsa.clone());
        assert!(lsdb.contains(&key));

        lsa.hdr.age = LSA_MAX_AGE;
        lsdb.install(lsa);
        assert!(!lsdb.contains(&key));
    }

    #[test]
    fn clear_drops_all_entries() {
        let mut lsdb = Lsdb::new();
        let body = LsaBody::Router(LsaRouter {
            flags: LsaRouterFlags::empty(),
            links: vec![],
        });
        let lsa = Lsa {
            raw: Default::default(),
            hdr: hdr(LSA_INIT_SEQ_NO, 0, 10),
            body,
            base_time: None,
        };
        lsdb.install(lsa);
        assert!(!lsdb.is_empty());

        lsdb.clear();
        assert!(lsdb.is_empty());
    }
}
