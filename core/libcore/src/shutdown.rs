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
//! The staged shutdown of the machine.
use crate::{
    error::*,
    signals::ShutdownMode,
    supervisor::Supervisor,
};
use basic::{mount_util, process_util};
use nix::sys::{reboot, signal::Signal};
use std::{convert::Infallible, time::Duration};

/// default time between SIGTERM and SIGKILL to every process
pub const DEFAULT_GRACE: Duration = Duration::from_secs(3);

/// detached in this order once every process is gone
pub const UMOUNT_TARGETS: [&str; 6] = ["/tmp", "/run", "/dev/pts", "/dev", "/sys", "/proc"];

/// The machine-wide operations of the shutdown sequence.
pub trait SystemOps {
    /// signal every process but the caller
    fn kill_all(&self, sig: Signal) -> Result<()>;
    ///
    fn sleep(&self, duration: Duration);
    /// flush filesystem buffers
    fn sync(&self);
    /// lazily detach the filesystem at `target`
    fn umount(&self, target: &str) -> Result<()>;
    /// Reboot, power off or halt. Only returns on failure.
    fn reboot(&self, mode: ShutdownMode) -> Result<Infallible>;
}

/// The real thing, only meaningful as pid 1.
#[derive(Debug, Default)]
pub struct LinuxOps;

impl SystemOps for LinuxOps {
    fn kill_all(&self, sig: Signal) -> Result<()> {
        process_util::kill_all(sig).context(UtilSnafu)
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn sync(&self) {
        nix::unistd::sync();
    }

    fn umount(&self, target: &str) -> Result<()> {
        mount_util::umount_detach(target).context(UtilSnafu)
    }

    fn reboot(&self, mode: ShutdownMode) -> Result<Infallible> {
        reboot::reboot(mode.reboot_mode()).context(NixSnafu)
    }
}

/// Runs the shutdown sequence.
pub struct Shutdown {
    ops: Box<dyn SystemOps>,
    grace: Duration,
}

impl Shutdown {
    ///
    pub fn new(ops: Box<dyn SystemOps>, grace: Duration) -> Self {
        Shutdown { ops, grace }
    }

    /// Stop the services, clear out every remaining process, flush and
    /// detach the filesystems and finally switch the machine off. Only
    /// returns when the last step failed.
    pub fn run(&self, supervisor: &mut Supervisor, mode: ShutdownMode) -> Result<Infallible> {
        log::info!("Shutting down ({}).", mode);

        supervisor.stop_all();

        log::info!("Sending SIGTERM to all processes.");
        if let Err(e) = self.ops.kill_all(Signal::SIGTERM) {
            log::warn!("Failed to send SIGTERM to all processes: {}", e);
        }
        self.ops.sleep(self.grace);

        log::info!("Sending SIGKILL to all processes.");
        if let Err(e) = self.ops.kill_all(Signal::SIGKILL) {
            log::warn!("Failed to send SIGKILL to all processes: {}", e);
        }

        self.ops.sync();

        for target in UMOUNT_TARGETS {
            match self.ops.umount(target) {
                Ok(()) => log::debug!("Unmounted {}.", target),
                Err(e) => log::debug!("Failed to unmount {}: {}", target, e),
            }
        }

        log::info!("System going down for {}.", mode);
        log::flush!();
        self.ops.reboot(mode)
    }

    /// [`Shutdown::run`], idling forever if the machine refuses to go down.
    pub fn execute(&self, supervisor: &mut Supervisor, mode: ShutdownMode) -> ! {
        if let Err(e) = self.run(supervisor, mode) {
            log::error!("Failed to {}: {}, halting here.", mode, e);
        }
        loop {
            std::thread::sleep(Duration::from_secs(3600));
        }
    }
}
