//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use ospfprobe_packet::error::DecodeError;
use ospfprobe_packet::header::PacketType;
use tracing::{error, warn};

use crate::interface::ism;
use crate::neighbor::nsm;

/// Top-level error type for everything that can go wrong after start-up.
/// Every variant is logged and contained at its call site; nothing here is
/// fatal to the running process.
#[derive(Debug)]
pub enum Error {
    IoError(IoError),
    PacketDecodeError(DecodeError),
    UnknownNeighbor(Ipv4Addr),
    InterfaceCfgError(PacketType, InterfaceCfgError),
    DbDescReject(Ipv4Addr, nsm::State),
    LsaUnknownType(u8),
    IsmUnexpectedEvent(ism::State, ism::Event),
    NsmUnexpectedEvent(Ipv4Addr, nsm::State, nsm::Event),
}

/// Socket and raw I/O errors.
#[derive(Debug)]
pub enum IoError {
    SocketError(std::io::Error),
    MulticastJoinError(std::io::Error),
    MulticastLeaveError(std::io::Error),
    RecvError(std::io::Error),
    SendError(std::io::Error),
}

/// Per-field Hello mismatches that prevent adjacency (RFC 2328 §10.5).
#[derive(Debug)]
pub enum InterfaceCfgError {
    AreaIdMismatch(Ipv4Addr, Ipv4Addr),
    NetmaskMismatch(Ipv4Addr, Ipv4Addr),
    HelloIntervalMismatch(u16, u16),
    DeadIntervalMismatch(u32, u32),
    ExternalRoutingCapabilityMismatch(bool),
    NssaCapabilityMismatch(bool),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::IoError(error) => error.log(),
            Error::PacketDecodeError(error) => {
                warn!(%error, "{}", self);
            }
            Error::UnknownNeighbor(router_id) => {
                warn!(%router_id, "{}", self);
            }
            Error::InterfaceCfgError(pkt_type, error) => {
                warn!(?pkt_type, "{}", self);
                error.log();
            }
            Error::DbDescReject(router_id, state) => {
                warn!(%router_id, ?state, "{}", self);
            }
            Error::LsaUnknownType(lsa_type) => {
                warn!(%lsa_type, "{}", self);
            }
            Error::IsmUnexpectedEvent(state, event) => {
                warn!(?state, ?event, "{}", self);
            }
            Error::NsmUnexpectedEvent(router_id, state, event) => {
                warn!(%router_id, ?state, ?event, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(error) => error.fmt(f),
            Error::PacketDecodeError(..) => write!(f, "failed to decode packet"),
            Error::UnknownNeighbor(..) => write!(f, "packet from unknown neighbor"),
            Error::InterfaceCfgError(_, error) => error.fmt(f),
            Error::DbDescReject(..) => write!(f, "database description packet rejected"),
            Error::LsaUnknownType(..) => write!(f, "discarding LSA due to unknown type"),
            Error::IsmUnexpectedEvent(..) => write!(f, "unexpected ISM event"),
            Error::NsmUnexpectedEvent(..) => write!(f, "unexpected NSM event"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(error) => Some(error),
            _ => None,
        }
    }
}

impl From<IoError> for Error {
    fn from(error: IoError) -> Error {
        Error::IoError(error)
    }
}

// ===== impl IoError =====

impl IoError {
    pub fn log(&self) {
        match self {
            IoError::SocketError(error) => error!(%error, "{}", self),
            IoError::MulticastJoinError(error) | IoError::MulticastLeaveError(error) => {
                warn!(%error, "{}", self)
            }
            IoError::RecvError(error) | IoError::SendError(error) => {
                warn!(%error, "{}", self)
            }
        }
    }
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError::SocketError(..) => write!(f, "failed to create raw IP socket"),
            IoError::MulticastJoinError(..) => write!(f, "failed to join multicast group"),
            IoError::MulticastLeaveError(..) => write!(f, "failed to leave multicast group"),
            IoError::RecvError(..) => write!(f, "failed to receive IP packet"),
            IoError::SendError(..) => write!(f, "failed to send IP packet"),
        }
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IoError::SocketError(error)
            | IoError::MulticastJoinError(error)
            | IoError::MulticastLeaveError(error)
            | IoError::RecvError(error)
            | IoError::SendError(error) => Some(error),
        }
    }
}

// ===== impl InterfaceCfgError =====

impl InterfaceCfgError {
    pub fn log(&self) {
        match self {
            InterfaceCfgError::AreaIdMismatch(received, expected) => {
                warn!(%received, %expected, "{}", self);
            }
            InterfaceCfgError::NetmaskMismatch(received, expected) => {
                warn!(%received, %expected, "{}", self);
            }
            InterfaceCfgError::HelloIntervalMismatch(received, expected) => {
                warn!(%received, %expected, "{}", self);
            }
            InterfaceCfgError::DeadIntervalMismatch(received, expected) => {
                warn!(%received, %expected, "{}", self);
            }
            InterfaceCfgError::ExternalRoutingCapabilityMismatch(e_bit) => {
                warn!(%e_bit, "{}", self);
            }
            InterfaceCfgError::NssaCapabilityMismatch(np_bit) => {
                warn!(%np_bit, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for InterfaceCfgError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterfaceCfgError::AreaIdMismatch(..) => write!(f, "area ID mismatch"),
            InterfaceCfgError::NetmaskMismatch(..) => write!(f, "network mask mismatch"),
            InterfaceCfgError::HelloIntervalMismatch(..) => write!(f, "hello interval mismatch"),
            InterfaceCfgError::DeadIntervalMismatch(..) => write!(f, "dead interval mismatch"),
            InterfaceCfgError::ExternalRoutingCapabilityMismatch(..) => {
                write!(f, "external routing capability mismatch")
            }
            InterfaceCfgError::NssaCapabilityMismatch(..) => write!(f, "NSSA capability mismatch"),
        }
    }
}

impl std::error::Error for InterfaceCfgError {}
