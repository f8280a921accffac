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
//! Recording stand-ins for the process and system primitives.
use crate::{
    registry::Registry,
    spawn::{ExecCommand, LaunchContext, Spawner},
    supervisor::Supervisor,
};
use nix::{errno::Errno, sys::signal::Signal, unistd::Pid};
use std::{
    cell::RefCell,
    os::unix::prelude::RawFd,
    path::{Path, PathBuf},
    rc::Rc,
};

pub(crate) struct Launch {
    pub path: String,
    pub fds: Vec<RawFd>,
    pub pid: Pid,
}

#[derive(Default)]
pub(crate) struct FakeState {
    /// every spawn/kill plus whatever else shares this state, in order
    pub events: Vec<String>,
    pub launches: Vec<Launch>,
    pub missing: Vec<PathBuf>,
    pub fail_fork: bool,
    next_pid: i32,
}

impl FakeState {
    pub fn launches_of(&self, path: &str) -> usize {
        self.launches.iter().filter(|l| l.path == path).count()
    }

    pub fn last_pid(&self) -> Pid {
        self.launches.last().map(|l| l.pid).unwrap()
    }
}

pub(crate) type Shared = Rc<RefCell<FakeState>>;

pub(crate) struct FakeSpawner {
    state: Shared,
}

impl FakeSpawner {
    pub fn new() -> (Self, Shared) {
        let state = Rc::new(RefCell::new(FakeState {
            next_pid: 1000,
            ..Default::default()
        }));
        (
            FakeSpawner {
                state: state.clone(),
            },
            state,
        )
    }
}

impl Spawner for FakeSpawner {
    fn is_executable(&self, path: &Path) -> bool {
        !self.state.borrow().missing.iter().any(|p| p == path)
    }

    fn spawn(&self, cmd: &ExecCommand, ctx: &LaunchContext) -> Result<Pid, Errno> {
        let mut state = self.state.borrow_mut();
        let path = cmd.path().to_string_lossy().to_string();
        if state.fail_fork {
            state.events.push(format!("fork-failed {}", path));
            return Err(Errno::EAGAIN);
        }
        let pid = Pid::from_raw(state.next_pid);
        state.next_pid += 1;
        state.events.push(format!("spawn {}", path));
        state.launches.push(Launch {
            path,
            fds: ctx.fds().to_vec(),
            pid,
        });
        Ok(pid)
    }

    fn kill(&self, pid: Pid, sig: Signal) -> Result<(), Errno> {
        self.state
            .borrow_mut()
            .events
            .push(format!("kill {} {}", pid, sig.as_str()));
        Ok(())
    }
}

/// A supervisor over `registry` that launches nothing for real.
pub(crate) fn supervisor(registry: Registry) -> (Supervisor, Shared) {
    let (spawner, state) = FakeSpawner::new();
    (Supervisor::new(registry, Box::new(spawner)), state)
}
