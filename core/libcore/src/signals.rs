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
//! The self-pipe signal bridge.
//!
//! Handlers only store into atomics and write a single byte to a
//! non-blocking pipe. The event loop polls the read end and does the real
//! work in normal context.
use crate::error::*;
use basic::io_util;
use nix::{
    fcntl::OFlag,
    libc,
    sys::{
        reboot::RebootMode,
        signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal},
    },
    unistd,
};
use std::{
    fmt,
    os::unix::prelude::RawFd,
    sync::atomic::{AtomicBool, AtomicI32, AtomicU8, Ordering},
};

/// How the machine goes down once the shutdown sequence is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    ///
    PowerOff,
    ///
    Reboot,
    ///
    Halt,
}

impl ShutdownMode {
    /// the operator signal requesting this mode
    pub fn from_signal(sig: Signal) -> Option<Self> {
        match sig {
            Signal::SIGTERM => Some(ShutdownMode::PowerOff),
            Signal::SIGINT => Some(ShutdownMode::Reboot),
            Signal::SIGUSR1 => Some(ShutdownMode::Halt),
            _ => None,
        }
    }

    /// the reboot(2) command for this mode
    pub fn reboot_mode(&self) -> RebootMode {
        match self {
            ShutdownMode::PowerOff => RebootMode::RB_POWER_OFF,
            ShutdownMode::Reboot => RebootMode::RB_AUTOBOOT,
            ShutdownMode::Halt => RebootMode::RB_HALT_SYSTEM,
        }
    }

    fn to_raw(self) -> u8 {
        match self {
            ShutdownMode::PowerOff => 1,
            ShutdownMode::Reboot => 2,
            ShutdownMode::Halt => 3,
        }
    }

    fn from_raw(v: u8) -> Option<Self> {
        match v {
            1 => Some(ShutdownMode::PowerOff),
            2 => Some(ShutdownMode::Reboot),
            3 => Some(ShutdownMode::Halt),
            _ => None,
        }
    }
}

impl fmt::Display for ShutdownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ShutdownMode::PowerOff => "poweroff",
            ShutdownMode::Reboot => "reboot",
            ShutdownMode::Halt => "halt",
        };
        write!(f, "{}", s)
    }
}

/* 0 means no shutdown requested, otherwise ShutdownMode::to_raw() */
static SHUTDOWN: AtomicU8 = AtomicU8::new(0);
static CHILD_EXITED: AtomicBool = AtomicBool::new(false);
static WAKE_FD: AtomicI32 = AtomicI32::new(-1);

const HANDLED: [Signal; 4] = [
    Signal::SIGTERM,
    Signal::SIGINT,
    Signal::SIGUSR1,
    Signal::SIGCHLD,
];

extern "C" fn handle_signal(signo: libc::c_int) {
    let saved = nix::errno::errno();

    if signo == libc::SIGCHLD {
        CHILD_EXITED.store(true, Ordering::SeqCst);
    } else if let Ok(sig) = Signal::try_from(signo) {
        if let Some(mode) = ShutdownMode::from_signal(sig) {
            SHUTDOWN.store(mode.to_raw(), Ordering::SeqCst);
        }
    }

    let fd = WAKE_FD.load(Ordering::SeqCst);
    if fd >= 0 {
        let byte = 1u8;
        /* A full pipe already guarantees a wakeup. */
        unsafe { libc::write(fd, &byte as *const u8 as *const libc::c_void, 1) };
    }

    unsafe { *libc::__errno_location() = saved };
}

/// Owner of the self-pipe. Only one bridge should exist per process.
#[derive(Debug)]
pub struct SignalBridge {
    read_fd: RawFd,
    write_fd: RawFd,
}

impl SignalBridge {
    /// Create the pipe and point the handlers at it.
    pub fn new() -> Result<Self> {
        let (read_fd, write_fd) =
            unistd::pipe2(OFlag::O_NONBLOCK | OFlag::O_CLOEXEC).context(NixSnafu)?;
        WAKE_FD.store(write_fd, Ordering::SeqCst);
        Ok(SignalBridge { read_fd, write_fd })
    }

    /// Install the handlers for the shutdown signals and SIGCHLD.
    pub fn install(&self) -> Result<()> {
        let action = SigAction::new(
            SigHandler::Handler(handle_signal),
            SaFlags::SA_RESTART | SaFlags::SA_NOCLDSTOP,
            SigSet::empty(),
        );
        for sig in HANDLED {
            unsafe { signal::sigaction(sig, &action) }.context(NixSnafu)?;
        }
        log::debug!("Signal handlers installed.");
        Ok(())
    }

    /// the descriptor to poll for readability
    pub fn fd(&self) -> RawFd {
        self.read_fd
    }

    /// Discard the pending wakeup bytes.
    pub fn drain(&self) -> usize {
        match io_util::drain(self.read_fd) {
            Ok(n) => n,
            Err(e) => {
                log::warn!("Failed to drain the signal pipe: {}", e);
                0
            }
        }
    }

    /// the shutdown mode requested by the latest operator signal
    pub fn shutdown_requested(&self) -> Option<ShutdownMode> {
        ShutdownMode::from_raw(SHUTDOWN.load(Ordering::SeqCst))
    }

    /// Whether SIGCHLD arrived since the last call; clears the flag.
    pub fn take_child_exited(&self) -> bool {
        CHILD_EXITED.swap(false, Ordering::SeqCst)
    }
}

impl Drop for SignalBridge {
    fn drop(&mut self) {
        let _ = WAKE_FD.compare_exchange(self.write_fd, -1, Ordering::SeqCst, Ordering::SeqCst);
        let _ = unistd::close(self.read_fd);
        let _ = unistd::close(self.write_fd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_signal() {
        assert_eq!(
            ShutdownMode::from_signal(Signal::SIGTERM),
            Some(ShutdownMode::PowerOff)
        );
        assert_eq!(
            ShutdownMode::from_signal(Signal::SIGINT),
            Some(ShutdownMode::Reboot)
        );
        assert_eq!(
            ShutdownMode::from_signal(Signal::SIGUSR1),
            Some(ShutdownMode::Halt)
        );
        assert_eq!(ShutdownMode::from_signal(Signal::SIGHUP), None);
    }

    #[test]
    fn test_mode_raw_and_reboot() {
        for mode in [
            ShutdownMode::PowerOff,
            ShutdownMode::Reboot,
            ShutdownMode::Halt,
        ] {
            assert_eq!(ShutdownMode::from_raw(mode.to_raw()), Some(mode));
        }
        assert_eq!(ShutdownMode::from_raw(0), None);
        assert_eq!(ShutdownMode::Reboot.reboot_mode(), RebootMode::RB_AUTOBOOT);
        assert_eq!(ShutdownMode::Halt.to_string(), "halt");
    }
}
