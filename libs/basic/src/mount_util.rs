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
    mount::{self, MntFlags, MsFlags},
    sys::stat,
};
use std::path::Path;

/// Lazily detach the filesystem mounted at `target`.
pub fn umount_detach(target: &str) -> Result<()> {
    mount::umount2(target, MntFlags::MNT_DETACH).context(NixSnafu)
}

/// Whether `path` is the root of a mounted filesystem, judged by a device
/// change against its parent directory. A missing path is no mount point.
pub fn is_mount_point(path: &Path) -> Result<bool> {
    let parent = match path.parent() {
        Some(p) => p,
        None => return Ok(true),
    };

    let f_stat = match stat::stat(path) {
        Ok(v) => v,
        Err(nix::Error::ENOENT) => return Ok(false),
        Err(e) => return Err(Error::Nix { source: e }),
    };
    let d_stat = stat::stat(parent).context(NixSnafu)?;

    Ok(f_stat.st_dev != d_stat.st_dev)
}

/// Mount `source` of type `fs_type` on `target`, creating `target` first.
pub fn mount_fs(
    source: &str,
    target: &str,
    fs_type: &str,
    flags: MsFlags,
    options: Option<&str>,
) -> Result<()> {
    std::fs::create_dir_all(target).context(IoSnafu)?;
    mount::mount(Some(source), target, Some(fs_type), flags, options).context(NixSnafu)
}
