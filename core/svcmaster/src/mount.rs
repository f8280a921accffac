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

//! mount the API filesystems before anything else runs
use basic::mount_util;
use nix::mount::MsFlags;
use std::path::Path;
use svcore::error::*;

struct MountPoint {
    source: &'static str,
    target: &'static str,
    fs_type: &'static str,
    options: Option<&'static str>,
    flags: MsFlags,
}

impl MountPoint {
    /// Ok(false) when something is mounted on the target already.
    fn mount(&self) -> Result<bool> {
        if let Ok(true) = mount_util::is_mount_point(Path::new(self.target)) {
            return Ok(false);
        }

        mount_util::mount_fs(
            self.source,
            self.target,
            self.fs_type,
            self.flags,
            self.options,
        )
        .context(UtilSnafu)?;
        Ok(true)
    }
}

/// Outcome of the early mounts. They run before the logger exists, so
/// the caller reports it once logging is up.
#[derive(Debug, Default)]
pub struct MountReport {
    pub mounted: Vec<&'static str>,
    pub present: Vec<&'static str>,
    pub failed: Vec<(&'static str, Error)>,
}

impl MountReport {
    pub fn log(&self) {
        for target in &self.mounted {
            log::debug!("mounted {}", target);
        }
        for target in &self.present {
            log::debug!("{} is already mounted, ignore it", target);
        }
        for (target, e) in &self.failed {
            log::warn!("failed to mount {}: {}", target, e);
        }
    }
}

fn mount_all(points: &[MountPoint]) -> MountReport {
    let mut report = MountReport::default();
    for point in points {
        match point.mount() {
            Ok(true) => report.mounted.push(point.target),
            Ok(false) => report.present.push(point.target),
            Err(e) => report.failed.push((point.target, e)),
        }
    }
    report
}

fn early_mount_table() -> [MountPoint; 4] {
    [
        MountPoint {
            source: "proc",
            target: "/proc",
            fs_type: "proc",
            options: None,
            flags: MsFlags::MS_NOSUID | MsFlags::MS_NOEXEC | MsFlags::MS_NODEV,
        },
        MountPoint {
            source: "sysfs",
            target: "/sys",
            fs_type: "sysfs",
            options: None,
            flags: MsFlags::MS_NOSUID | MsFlags::MS_NOEXEC | MsFlags::MS_NODEV,
        },
        MountPoint {
            source: "devtmpfs",
            target: "/dev",
            fs_type: "devtmpfs",
            options: Some("mode=755,size=4m,nr_inodes=1m"),
            flags: MsFlags::MS_NOSUID | MsFlags::MS_STRICTATIME,
        },
        MountPoint {
            source: "tmpfs",
            target: "/run",
            fs_type: "tmpfs",
            options: Some("mode=755,size=20%,nr_inodes=800K"),
            flags: MsFlags::MS_NOSUID | MsFlags::MS_NODEV | MsFlags::MS_STRICTATIME,
        },
    ]
}

/// mount /proc, /sys, /dev and /run unless they are mounted already.
/// A failed mount does not stop the others, boot goes on without it.
pub fn setup_mount_early() -> MountReport {
    mount_all(&early_mount_table())
}
