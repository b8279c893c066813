//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use bytes::{Buf, BufMut};

use crate::error::{DecodeError, DecodeResult};

// Small helpers on top of `bytes::Buf`/`BufMut` for the fixed-width fields
// that show up everywhere in OSPF wire formats: dotted-quad addresses and
// the 24-bit metric fields used by Summary/External LSAs.
pub trait BufExt: Buf {
    fn try_get_u8(&mut self) -> DecodeResult<u8> {
        if self.remaining() < 1 {
            return Err(DecodeError::InvalidLength(self.remaining() as u16));
        }
        Ok(self.get_u8())
    }

    fn try_get_u16(&mut self) -> DecodeResult<u16> {
        if self.remaining() < 2 {
            return Err(DecodeError::InvalidLength(self.remaining() as u16));
        }
        Ok(self.get_u16())
    }

    fn try_get_u32(&mut self) -> DecodeResult<u32> {
        if self.remaining() < 4 {
            return Err(DecodeError::InvalidLength(self.remaining() as u16));
        }
        Ok(self.get_u32())
    }

    fn try_get_u24(&mut self) -> DecodeResult<u32> {
        if self.remaining() < 3 {
            return Err(DecodeError::InvalidLength(self.remaining() as u16));
        }
        Ok(self.get_uint(3) as u32)
    }

    fn try_get_ipv4(&mut self) -> DecodeResult<Ipv4Addr> {
        Ok(Ipv4Addr::from(self.try_get_u32()?))
    }

    fn try_get_opt_ipv4(&mut self) -> DecodeResult<Option<Ipv4Addr>> {
        let addr = self.try_get_ipv4()?;
        Ok((!addr.is_unspecified()).then_some(addr))
    }
}

impl<T: Buf + ?Sized> BufExt for T {}

pub trait BufMutExt: BufMut {
    fn put_ipv4(&mut self, addr: &Ipv4Addr) {
        self.put_slice(&addr.octets());
    }

    fn put_u24(&mut self, value: u32) {
        self.put_uint(value as u64, 3);
    }
}

impl<T: BufMut + ?Sized> BufMutExt for T {}
