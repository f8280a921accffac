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
//! Error define, each crate defines its own error.rs.
//! Within svcore only this Error is used, errors from the helper crates
//! and from nix are wrapped into it.

pub use nix::errno::Errno;
use snafu::prelude::*;
#[allow(unused_imports)]
pub use snafu::ResultExt;
use std::path::PathBuf;

/// svcore Error
#[allow(missing_docs)]
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("service '{}' is already registered", name))]
    DuplicateName { name: String },

    #[snafu(display("service '{}' not found", name))]
    NotFound { name: String },

    #[snafu(display("too many {} (limit {})", what, limit))]
    CapacityExceeded { what: &'static str, limit: usize },

    #[snafu(display("Invalid: '{}'.", what))]
    Invalid { what: String },

    #[snafu(display("'{}' is missing or not executable", path.display()))]
    NotExecutable { path: PathBuf },

    #[snafu(display("failed to spawn '{}': {}", name, source))]
    Spawn { name: String, source: nix::Error },

    #[snafu(display("NulError: '{}'", source))]
    NulError { source: std::ffi::NulError },

    #[snafu(display("Confique error: {}", source))]
    Confique { source: confique::Error },

    #[snafu(display("UtilError(svcore): {}", source))]
    Util { source: basic::Error },

    #[snafu(display("NixError(svcore): {}", source))]
    Nix { source: nix::Error },
}

/// Convert to the standard linux error code
impl From<Error> for nix::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::DuplicateName { .. } => nix::Error::EEXIST,
            Error::NotFound { .. } => nix::Error::ENOENT,
            Error::CapacityExceeded { .. } => nix::Error::ENOSPC,
            Error::Invalid { .. } => nix::Error::EINVAL,
            Error::NotExecutable { .. } => nix::Error::ENOEXEC,
            Error::Spawn { source, .. } => source,
            Error::NulError { .. } => nix::Error::EINVAL,
            Error::Confique { .. } => nix::Error::EINVAL,
            Error::Util { source } => nix::Error::from_i32(source.get_errno()),
            Error::Nix { source } => source,
        }
    }
}

impl From<basic::Error> for Error {
    fn from(e: basic::Error) -> Error {
        Error::Util { source: e }
    }
}

/// svcore Result
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_conversion() {
        let e: nix::Error = Error::NotFound {
            name: "sshd".to_string(),
        }
        .into();
        assert_eq!(e, Errno::ENOENT);

        let e: nix::Error = Error::Util {
            source: basic::Error::Nix {
                source: Errno::EPERM,
            },
        }
        .into();
        assert_eq!(e, Errno::EPERM);

        let e: nix::Error = Error::Util {
            source: basic::Error::Io {
                source: std::io::Error::from_raw_os_error(libc::EADDRINUSE),
            },
        }
        .into();
        assert_eq!(e, Errno::EADDRINUSE);

        let e = Error::CapacityExceeded {
            what: "dependencies",
            limit: 16,
        };
        assert_eq!(e.to_string(), "too many dependencies (limit 16)");
    }
}
