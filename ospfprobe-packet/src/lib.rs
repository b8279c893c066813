//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! OSPFv2 (RFC 2328) wire-format codec: packet headers, the five PDU
//! bodies, and every standard LSA type this probe needs to decode in order
//! to mirror a neighbor's link-state database.
//!
//! This crate never originates topology LSAs and never computes routes; it
//! only parses and re-serializes what a real router already sent.

pub mod bytes_ext;
pub mod dbdesc;
pub mod error;
pub mod header;
pub mod hello;
pub mod lsa;
pub mod lsack;
pub mod lsrequest;
pub mod lsupdate;
pub mod options;
pub mod packet;
pub mod tlv;

pub use crate::dbdesc::{DbDesc, DbDescFlags};
pub use crate::error::{DecodeError, DecodeResult, LsaValidationError};
pub use crate::header::{AuthType, PacketHdr, PacketType};
pub use crate::hello::Hello;
pub use crate::lsa::{Lsa, LsaBody, LsaHdr, LsaKey, LsaScope, LsaType, LsaTypeCode};
pub use crate::lsack::LsAck;
pub use crate::lsrequest::LsRequest;
pub use crate::lsupdate::LsUpdate;
pub use crate::options::Options;
pub use crate::packet::Packet;
