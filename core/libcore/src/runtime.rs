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
//! The event loop of pid 1: wait on the signal pipe and the activation
//! sockets, reap exited children and hand everything to the supervisor.
use crate::{
    activation::SocketActivation, shutdown::Shutdown, signals::ShutdownMode,
    signals::SignalBridge, supervisor::Supervisor,
};
use basic::io_util;
use nix::{
    errno::Errno,
    poll::{PollFd, PollFlags},
    sys::wait::{self, WaitPidFlag, WaitStatus},
    unistd::Pid,
};
use std::os::unix::prelude::RawFd;

/// default poll timeout in milliseconds
pub const DEFAULT_POLL_TIMEOUT: i32 = 1000;

/// What the loop should do after one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    ///
    Running,
    /// an operator asked for the machine to go down
    Shutdown(ShutdownMode),
}

/// Owns the supervisor and the signal bridge for the lifetime of pid 1.
pub struct Runtime {
    supervisor: Supervisor,
    bridge: SignalBridge,
    timeout: i32,
    /* listeners whose service could not start yet, unwatched until a child exits */
    parked: Vec<RawFd>,
}

impl Runtime {
    /// `timeout` bounds each wait in milliseconds, negative waits forever.
    pub fn new(supervisor: Supervisor, bridge: SignalBridge, timeout: i32) -> Self {
        Runtime {
            supervisor,
            bridge,
            timeout,
            parked: Vec::new(),
        }
    }

    ///
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    ///
    pub fn supervisor_mut(&mut self) -> &mut Supervisor {
        &mut self.supervisor
    }

    /// Collect every exited child without blocking. Returns the number of
    /// children reaped, services or not.
    pub fn reap(&mut self) -> usize {
        let mut reaped = 0;
        loop {
            match wait::waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => break,
                Ok(status) => {
                    if let Some(pid) = status.pid() {
                        reaped += 1;
                        self.supervisor.notify_exit(pid, status);
                    }
                }
                Err(Errno::EINTR) => continue,
                Err(Errno::ECHILD) => break,
                Err(e) => {
                    log::warn!("waitpid failed: {}", e);
                    break;
                }
            }
        }
        if reaped > 0 {
            self.parked.clear();
        }
        reaped
    }

    /// One pass of the loop. A listener whose service did not start stays
    /// out of the watch set until a child is reaped or another service was
    /// activated, either may have satisfied its dependencies.
    pub fn run_once(&mut self) -> LoopState {
        if let Some(mode) = self.bridge.shutdown_requested() {
            return LoopState::Shutdown(mode);
        }
        if self.bridge.take_child_exited() {
            self.reap();
        }

        let listeners: Vec<RawFd> = SocketActivation::watch_fds(self.supervisor.registry())
            .into_iter()
            .filter(|fd| !self.parked.contains(fd))
            .collect();
        let mut fds: Vec<PollFd> = listeners
            .iter()
            .map(|fd| PollFd::new(*fd, PollFlags::POLLIN))
            .collect();
        fds.push(PollFd::new(self.bridge.fd(), PollFlags::POLLIN));

        match io_util::poll_timeout(&mut fds, self.timeout) {
            Ok(0) => return LoopState::Running,
            Ok(_) => {}
            Err(e) if e.get_errno() == libc::EINTR => return LoopState::Running,
            Err(e) => {
                log::error!("Failed to wait for events: {}", e);
                return LoopState::Running;
            }
        }

        let ready: Vec<RawFd> = fds
            .iter()
            .zip(listeners.iter().copied().chain(Some(self.bridge.fd())))
            .filter(|(p, _)| {
                p.revents()
                    .map_or(false, |r| r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP))
            })
            .map(|(_, fd)| fd)
            .collect();

        for fd in ready {
            if fd == self.bridge.fd() {
                self.bridge.drain();
                if let Some(mode) = self.bridge.shutdown_requested() {
                    return LoopState::Shutdown(mode);
                }
                if self.bridge.take_child_exited() {
                    self.reap();
                }
            } else if SocketActivation::dispatch(&mut self.supervisor, fd) {
                self.parked.clear();
            } else if !self.parked.contains(&fd) {
                log::debug!("Listener fd {} parked until a child exits.", fd);
                self.parked.push(fd);
            }
        }

        LoopState::Running
    }

    /// Loop until an operator signal, then close the listeners and hand
    /// over to `shutdown`.
    pub fn run(mut self, shutdown: Shutdown) -> ! {
        log::info!("Entering the event loop.");
        loop {
            if let LoopState::Shutdown(mode) = self.run_once() {
                SocketActivation::cleanup(self.supervisor.registry_mut());
                shutdown.execute(&mut self.supervisor, mode);
            }
        }
    }
}
