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

//!
use crate::error::*;
use nix::{
    errno::Errno,
    sys::signal::{self, Signal},
    unistd::Pid,
};

/// Send `sig` to every process the caller may signal, except itself and
/// the kernel threads. Having nobody left to signal is not an error.
pub fn kill_all<T: Into<Option<Signal>>>(sig: T) -> Result<()> {
    match signal::kill(Pid::from_raw(-1), sig) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(Error::Nix { source: e }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kill_all_null_signal() {
        /* no signal, only the permission check */
        assert!(kill_all(None).is_ok());
    }
}
