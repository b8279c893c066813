//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::os::fd::AsRawFd;
use std::sync::LazyLock as Lazy;

use bytes::{Bytes, BytesMut};
use nix::sys::socket::{self, SockaddrIn};
use socket2::{Domain, InterfaceIndexOrAddress, Protocol, SockRef, Socket as Socket2, Type};
use tokio::io::unix::AsyncFd;

use crate::error::IoError;

/// IANA-assigned IP protocol number for OSPF.
pub const OSPF_IP_PROTO: i32 = 89;

pub static ALL_SPF_RTRS: Lazy<Ipv4Addr> = Lazy::new(|| Ipv4Addr::new(224, 0, 0, 5));
pub static ALL_DR_RTRS: Lazy<Ipv4Addr> = Lazy::new(|| Ipv4Addr::new(224, 0, 0, 6));

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MulticastAddr {
    AllSpfRtrs,
    AllDrRtrs,
}

impl MulticastAddr {
    pub fn addr(self) -> Ipv4Addr {
        match self {
            MulticastAddr::AllSpfRtrs => *ALL_SPF_RTRS,
            MulticastAddr::AllDrRtrs => *ALL_DR_RTRS,
        }
    }
}

/// An async-wrapped raw IP socket bound to protocol 89 on one interface.
pub struct OspfSocket {
    io: AsyncFd<Socket2>,
}

impl OspfSocket {
    pub fn new(ifname: &str) -> Result<OspfSocket, IoError> {
        let socket = Socket2::new(Domain::IPV4, Type::RAW, Some(Protocol::from(OSPF_IP_PROTO)))
            .map_err(IoError::SocketError)?;
        socket.set_nonblocking(true).map_err(IoError::SocketError)?;
        socket
            .bind_device(Some(ifname.as_bytes()))
            .map_err(IoError::SocketError)?;
        socket.set_multicast_loop_v4(false).map_err(IoError::SocketError)?;
        socket.set_multicast_ttl_v4(1).map_err(IoError::SocketError)?;

        let io = AsyncFd::new(socket).map_err(IoError::SocketError)?;
        Ok(OspfSocket { io })
    }

    pub fn join_multicast(&self, addr: MulticastAddr, ifindex: u32) -> Result<(), IoError> {
        SockRef::from(self.io.get_ref())
            .join_multicast_v4_n(&addr.addr(), &InterfaceIndexOrAddress::Index(ifindex))
            .map_err(IoError::MulticastJoinError)
    }

    pub fn leave_multicast(&self, addr: MulticastAddr, ifindex: u32) -> Result<(), IoError> {
        SockRef::from(self.io.get_ref())
            .leave_multicast_v4_n(&addr.addr(), &InterfaceIndexOrAddress::Index(ifindex))
            .map_err(IoError::MulticastLeaveError)
    }

    /// Sends `data` to `dst` using raw IP (no kernel-composed IP header
    /// beyond what `sendto` adds for `SOCK_RAW`).
    pub async fn send_to(&self, data: &[u8], dst: Ipv4Addr) -> Result<(), IoError> {
        loop {
            let mut guard = self.io.writable().await.map_err(IoError::SendError)?;
            let dst_addr = SockaddrIn::from(SocketAddrV4::new(dst, 0));
            match guard.try_io(|io| {
                socket::sendto(io.get_ref().as_raw_fd(), data, &dst_addr, socket::MsgFlags::empty())
                    .map_err(io::Error::from)
            }) {
                Ok(result) => return result.map(|_| ()).map_err(IoError::SendError),
                Err(_would_block) => continue,
            }
        }
    }

    /// Receives one datagram, returning its payload (including the IPv4
    /// header prepended by `SOCK_RAW`) and the source address.
    pub async fn recv_from(&self) -> Result<(Bytes, Ipv4Addr), IoError> {
        loop {
            let mut guard = self.io.readable().await.map_err(IoError::RecvError)?;
            let mut buf = BytesMut::zeroed(65535);
            match guard.try_io(|io| {
                socket::recvfrom::<SockaddrIn>(io.get_ref().as_raw_fd(), &mut buf)
                    .map_err(io::Error::from)
            }) {
                Ok(Ok((n, from))) => {
                    buf.truncate(n);
                    let src = from
                        .map(|a| *a.ip())
                        .unwrap_or(Ipv4Addr::UNSPECIFIED);
                    return Ok((buf.freeze(), src));
                }
                Ok(Err(error)) => return Err(IoError::RecvError(error)),
                Err(_would_block) => continue,
            }
        }
    }
}
