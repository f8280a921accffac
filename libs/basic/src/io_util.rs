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
    libc,
    poll::{self, PollFd, PollFlags},
};
use std::os::unix::prelude::RawFd;

/// Wait on `fds` for at most `timeout` milliseconds, a negative timeout
/// waits forever. Returns the number of descriptors with events.
pub fn poll_timeout(fds: &mut [PollFd], timeout: libc::c_int) -> Result<libc::c_int> {
    let ret = poll::poll(fds, timeout).context(NixSnafu)?;

    if ret == 0 {
        return Ok(0);
    }

    for item in fds.iter() {
        if let Some(revents) = item.revents() {
            if revents.eq(&PollFlags::POLLNVAL) {
                return Err(Error::Nix {
                    source: Errno::EBADF,
                });
            }
        }
    }

    Ok(ret)
}

/// Read a non-blocking descriptor until it would block, discarding
/// everything. Returns the number of bytes thrown away.
pub fn drain(fd: RawFd) -> Result<usize> {
    let mut buf = [0u8; 64];
    let mut total = 0;

    loop {
        match nix::unistd::read(fd, &mut buf) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(Errno::EINTR) => continue,
            Err(Errno::EAGAIN) => break,
            Err(e) => return Err(Error::Nix { source: e }),
        }
    }

    Ok(total)
}
