// Copyright (c) 2022 Huawei Technologies Co.,Ltd. All rights reserved.
//
// sysMaster is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan
// PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//         http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY
// KIND, EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO
// NON-INFRINGEMENT, MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.
//! svcore is the service supervisor that svcmaster runs as the first
//! user-space process: a registry of declared services, a dependency
//! ordered boot, process supervision with bounded restarts, socket
//! activation, a signal driven event loop and the staged shutdown.
pub mod activation;
pub mod config;
pub mod error;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod service;
pub mod shutdown;
pub mod signals;
pub mod spawn;
pub mod supervisor;

#[cfg(test)]
mod test_utils;

pub use error::*;
