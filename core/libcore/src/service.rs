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
//! The service record: static declaration plus the runtime state owned
//! by the supervisor.
use crate::error::*;
use nix::unistd::Pid;
use std::{
    fmt,
    os::unix::prelude::RawFd,
    path::{Path, PathBuf},
    str::FromStr,
};

/// How the supervisor decides a launched service has come up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    /// Long running, considered up as soon as the fork succeeded.
    Simple,
    /// Runs to completion, considered done once it exited with 0.
    OneShot,
    /// Would signal readiness itself. No readiness channel exists, so it
    /// stays Starting until it exits.
    Notify,
}

impl FromStr for ServiceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(ServiceKind::Simple),
            "oneshot" => Ok(ServiceKind::OneShot),
            "notify" => Ok(ServiceKind::Notify),
            _ => Err(Error::Invalid {
                what: format!("service type {}", s),
            }),
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceKind::Simple => "simple",
            ServiceKind::OneShot => "oneshot",
            ServiceKind::Notify => "notify",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle state of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    ///
    Stopped,
    ///
    Starting,
    ///
    Running,
    ///
    Stopping,
    ///
    Failed,
}

impl ServiceState {
    /// a process may be outstanding in this state
    pub fn is_active(&self) -> bool {
        matches!(self, ServiceState::Starting | ServiceState::Running)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::Stopped => "STOPPED",
            ServiceState::Starting => "STARTING",
            ServiceState::Running => "RUNNING",
            ServiceState::Stopping => "STOPPING",
            ServiceState::Failed => "FAILED",
        };
        f.pad(s)
    }
}

/// One declared service. Created by registration and never destroyed.
#[derive(Debug)]
pub struct Service {
    name: String,
    exec_path: PathBuf,
    argv: Vec<String>,
    kind: ServiceKind,
    dependencies: Vec<String>,
    auto_restart: bool,
    restart_count: u32,
    max_restarts: u32,
    socket_path: Option<PathBuf>,
    listen_fd: Option<RawFd>,
    state: ServiceState,
    pid: Option<Pid>,
    last_exit_code: i32,
}

impl Service {
    pub(crate) fn new(
        name: &str,
        exec_path: &Path,
        kind: ServiceKind,
        auto_restart: bool,
        max_restarts: u32,
    ) -> Self {
        Service {
            name: name.to_string(),
            exec_path: exec_path.to_path_buf(),
            argv: vec![exec_path.to_string_lossy().to_string()],
            kind,
            dependencies: Vec::new(),
            auto_restart,
            restart_count: 0,
            max_restarts,
            socket_path: None,
            listen_fd: None,
            state: ServiceState::Stopped,
            pid: None,
            last_exit_code: 0,
        }
    }

    ///
    pub fn name(&self) -> &str {
        &self.name
    }

    ///
    pub fn exec_path(&self) -> &Path {
        &self.exec_path
    }

    /// the full argument vector, argv\[0\] is the executable path
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    ///
    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    /// names of the services this one depends on, in declaration order
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    ///
    pub fn auto_restart(&self) -> bool {
        self.auto_restart
    }

    ///
    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    ///
    pub fn max_restarts(&self) -> u32 {
        self.max_restarts
    }

    /// socket activation is enabled when a socket path is declared
    pub fn socket_path(&self) -> Option<&Path> {
        self.socket_path.as_deref()
    }

    ///
    pub fn listen_fd(&self) -> Option<RawFd> {
        self.listen_fd
    }

    ///
    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// the pid of the outstanding process, if any
    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    /// exit code of the last process, `-signo` when it was killed by a signal
    pub fn last_exit_code(&self) -> i32 {
        self.last_exit_code
    }

    pub(crate) fn push_argument(&mut self, arg: &str) {
        self.argv.push(arg.to_string());
    }

    pub(crate) fn push_dependency(&mut self, dep: &str) {
        self.dependencies.push(dep.to_string());
    }

    pub(crate) fn set_socket_path(&mut self, path: &Path) {
        self.socket_path = Some(path.to_path_buf());
    }

    pub(crate) fn set_max_restarts(&mut self, max: u32) {
        self.max_restarts = max;
    }

    pub(crate) fn set_listen_fd(&mut self, fd: Option<RawFd>) {
        self.listen_fd = fd;
    }

    pub(crate) fn set_state(&mut self, state: ServiceState) {
        if self.state != state {
            log::debug!("{}: {} -> {}", self.name, self.state, state);
        }
        self.state = state;
    }

    pub(crate) fn set_pid(&mut self, pid: Option<Pid>) {
        self.pid = pid;
    }

    pub(crate) fn set_last_exit_code(&mut self, code: i32) {
        self.last_exit_code = code;
    }

    pub(crate) fn inc_restart_count(&mut self) {
        self.restart_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str() {
        assert_eq!("simple".parse::<ServiceKind>().unwrap(), ServiceKind::Simple);
        assert_eq!(
            "oneshot".parse::<ServiceKind>().unwrap(),
            ServiceKind::OneShot
        );
        assert_eq!("notify".parse::<ServiceKind>().unwrap(), ServiceKind::Notify);
        assert!("forking".parse::<ServiceKind>().is_err());
        assert_eq!(ServiceKind::OneShot.to_string(), "oneshot");
    }

    #[test]
    fn test_new_service() {
        let svc = Service::new(
            "syslog",
            Path::new("/sbin/syslogd"),
            ServiceKind::Simple,
            true,
            5,
        );
        assert_eq!(svc.argv(), &["/sbin/syslogd".to_string()]);
        assert_eq!(svc.state(), ServiceState::Stopped);
        assert_eq!(svc.pid(), None);
        assert_eq!(svc.last_exit_code(), 0);
        assert_eq!(svc.restart_count(), 0);
        assert!(svc.socket_path().is_none());
        assert_eq!(format!("{:<9}|", svc.state()), "STOPPED  |");
    }
}
