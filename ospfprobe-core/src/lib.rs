//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod debug;
pub mod error;
pub mod flood;
pub mod instance;
pub mod interface;
pub mod ip;
pub mod lsdb;
pub mod neighbor;
pub mod network;
pub mod stats;
pub mod task;
