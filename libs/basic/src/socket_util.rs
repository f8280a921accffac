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
use crate::{error::*, fd_util};
use nix::sys::socket::{self, AddressFamily, SockFlag, SockType, UnixAddr};
use std::{io::ErrorKind, os::unix::prelude::RawFd, path::Path};

/// Create a non-blocking unix stream socket listening on `path`.
///
/// A stale socket file left at `path` is removed first and a missing
/// parent directory is created. The returned descriptor is close-on-exec.
pub fn unix_listen(path: &Path, backlog: usize) -> Result<RawFd> {
    match std::fs::remove_file(path) {
        Ok(()) => log::debug!("Removed stale socket {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(Error::Io { source: e }),
    }

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir).context(IoSnafu)?;
        }
    }

    let addr = UnixAddr::new(path).context(NixSnafu)?;
    let fd = socket::socket(
        AddressFamily::Unix,
        SockType::Stream,
        SockFlag::SOCK_CLOEXEC,
        None,
    )
    .context(NixSnafu)?;

    if let Err(e) = bind_listen(fd, &addr, backlog) {
        fd_util::close(fd);
        return Err(e);
    }

    Ok(fd)
}

fn bind_listen(fd: RawFd, addr: &UnixAddr, backlog: usize) -> Result<()> {
    socket::bind(fd, addr).context(NixSnafu)?;
    socket::listen(fd, backlog).context(NixSnafu)?;
    fd_util::fd_nonblock(fd, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixStream;

    #[test]
    fn test_unix_listen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub/echo.sock");

        let fd = unix_listen(&path, 8).unwrap();
        assert!(path.exists());
        assert!(fd_util::fd_is_nonblock(fd));
        assert!(fd_util::fd_is_cloexec(fd));
        assert!(UnixStream::connect(&path).is_ok());
        fd_util::close(fd);

        /* The stale file from the first listener must not get in the way. */
        let fd = unix_listen(&path, 8).unwrap();
        fd_util::close(fd);
    }

    #[test]
    fn test_unix_listen_bad_path() {
        let long = "x".repeat(200);
        let dir = tempfile::tempdir().unwrap();
        assert!(unix_listen(&dir.path().join(long), 8).is_err());
    }
}
