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

//! Logging for svcmaster: `log::info!` and friends routed to the console
//! and/or the kernel ring buffer.
pub mod inner;
pub mod logger;

/// reexport log::Log
pub use log::max_level;
pub use log::set_max_level;
pub use log::Log;
pub use log::{Level, LevelFilter};
pub use log::{Metadata, MetadataBuilder};
pub use log::{Record, RecordBuilder};

/// Reinit the logger based on the previous configuration
pub fn reinit() {
    inner::reinit();
}

pub use logger::init_log;

/// Translate a configured target string such as "kmsg-console" into
/// the targets understood by [`init_log`].
pub fn parse_targets(target: &str) -> Vec<&str> {
    target
        .split(|c| c == '-' || c == ',')
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect()
}
