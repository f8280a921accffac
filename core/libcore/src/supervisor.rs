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
//! The process supervisor: launches services, reacts to their exit and
//! applies the restart policy.
use crate::{
    error::*,
    registry::Registry,
    resolver::{self, StartReport},
    service::{Service, ServiceKind, ServiceState},
    spawn::{ExecCommand, LaunchContext, Spawner},
};
use nix::{
    sys::{signal::Signal, wait::WaitStatus},
    unistd::Pid,
};

/// What a start request ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// a new process was forked
    Launched(Pid),
    /// the service still has a process, nothing was done
    AlreadyActive,
    /// a dependency is not satisfied yet, the state is unchanged
    Deferred,
}

/// Owns the registry and drives every state transition of its services.
pub struct Supervisor {
    registry: Registry,
    spawner: Box<dyn Spawner>,
}

impl Supervisor {
    ///
    pub fn new(registry: Registry, spawner: Box<dyn Spawner>) -> Self {
        Supervisor { registry, spawner }
    }

    ///
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    ///
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Start `name` if its dependencies allow it.
    pub fn start(&mut self, name: &str) -> Result<StartOutcome> {
        let idx = self.index(name)?;
        self.start_index(idx)
    }

    pub(crate) fn start_index(&mut self, idx: usize) -> Result<StartOutcome> {
        let svc = self.service(idx)?;
        if let Some(pid) = svc.pid() {
            log::warn!(
                "{} is already {} (pid {}), not starting it again.",
                svc.name(),
                svc.state(),
                pid
            );
            return Ok(StartOutcome::AlreadyActive);
        }

        if !self.deps_satisfied(idx) {
            log::info!("{}: dependencies not satisfied, start deferred.", svc.name());
            return Ok(StartOutcome::Deferred);
        }

        self.launch(idx)
    }

    fn launch(&mut self, idx: usize) -> Result<StartOutcome> {
        let svc = self.service(idx)?;
        let name = svc.name().to_string();
        let kind = svc.kind();

        if !self.spawner.is_executable(svc.exec_path()) {
            log::error!(
                "{}: {} is missing or not executable.",
                name,
                svc.exec_path().display()
            );
            let path = svc.exec_path().to_path_buf();
            self.set_state(idx, ServiceState::Failed);
            return Err(Error::NotExecutable { path });
        }

        let cmd = match ExecCommand::new(svc.exec_path(), svc.argv()) {
            Ok(cmd) => cmd,
            Err(e) => {
                log::error!("{}: invalid command line: {}", name, e);
                self.set_state(idx, ServiceState::Failed);
                return Err(e);
            }
        };
        let ctx = match svc.listen_fd() {
            Some(fd) => LaunchContext::with_fds(vec![fd]),
            None => LaunchContext::new(),
        };

        self.set_state(idx, ServiceState::Starting);
        let pid = match self.spawner.spawn(&cmd, &ctx) {
            Ok(pid) => pid,
            Err(e) => {
                log::error!("{}: fork failed: {}", name, e);
                self.set_state(idx, ServiceState::Failed);
                return Err(Error::Spawn { name, source: e });
            }
        };

        if let Some(svc) = self.registry.get_mut(idx) {
            svc.set_pid(Some(pid));
            if kind == ServiceKind::Simple {
                svc.set_state(ServiceState::Running);
            }
        }
        log::info!("Started {} (pid {}).", name, pid);
        Ok(StartOutcome::Launched(pid))
    }

    /// Ask `name` to terminate. The exit is observed later through
    /// [`Supervisor::notify_exit`].
    pub fn stop(&mut self, name: &str) -> Result<()> {
        let idx = self.index(name)?;
        self.stop_index(idx);
        Ok(())
    }

    fn stop_index(&mut self, idx: usize) {
        let svc = match self.registry.get_mut(idx) {
            Some(v) => v,
            None => return,
        };
        if !svc.state().is_active() {
            log::debug!("{} is {}, nothing to stop.", svc.name(), svc.state());
            return;
        }

        svc.set_state(ServiceState::Stopping);
        let pid = match svc.pid() {
            Some(p) => p,
            None => return,
        };
        log::info!("Stopping {} (pid {}).", svc.name(), pid);
        if let Err(e) = self.spawner.kill(pid, Signal::SIGTERM) {
            log::warn!("Failed to send SIGTERM to {}: {}", pid, e);
        }
    }

    /// Stop every active service, last registered first.
    pub fn stop_all(&mut self) {
        for idx in (0..self.registry.len()).rev() {
            let active = self
                .registry
                .get(idx)
                .map_or(false, |s| s.state().is_active());
            if active {
                self.stop_index(idx);
            }
        }
    }

    /// Attempt every service once, in dependency order.
    pub fn start_all(&mut self) -> StartReport {
        let plan = resolver::plan(&self.registry);
        let mut report = StartReport {
            total: self.registry.len(),
            unresolved: plan.unresolved,
            ..Default::default()
        };

        for idx in plan.order {
            report.processed += 1;
            match self.start_index(idx) {
                Ok(StartOutcome::Launched(_)) | Ok(StartOutcome::AlreadyActive) => {
                    report.started += 1
                }
                Ok(StartOutcome::Deferred) => {}
                Err(e) => log::warn!("Boot start failed: {}", e),
            }
        }

        if !report.unresolved.is_empty() {
            log::error!(
                "Circular or missing dependency: {} services unresolvable.",
                report.unresolved.len()
            );
            for u in report.unresolved.iter() {
                log::error!("  {} ({} dependencies never started)", u.name, u.pending);
            }
        }
        log::info!(
            "Boot start: {} of {} services attempted, {} started.",
            report.processed,
            report.total,
            report.started
        );
        report
    }

    /// Whether every dependency of the service at `idx` allows it to start.
    pub fn deps_satisfied(&self, idx: usize) -> bool {
        let svc = match self.registry.get(idx) {
            Some(v) => v,
            None => return false,
        };
        for dep in svc.dependencies() {
            let d = match self.registry.find(dep) {
                Some(d) => d,
                None => {
                    log::debug!("{}: dependency {} is not registered.", svc.name(), dep);
                    return false;
                }
            };
            let ok = match d.kind() {
                ServiceKind::OneShot => oneshot_done(d),
                ServiceKind::Simple | ServiceKind::Notify => d.state() == ServiceState::Running,
            };
            if !ok {
                return false;
            }
        }
        true
    }

    /// Feed the termination of `pid` into the state machine. Returns
    /// false when `pid` belongs to no service or `status` is no exit.
    pub fn notify_exit(&mut self, pid: Pid, status: WaitStatus) -> bool {
        let code = match status {
            WaitStatus::Exited(_, code) => code,
            WaitStatus::Signaled(_, sig, _) => -(sig as i32),
            _ => return false,
        };

        let idx = match self.registry.find_by_pid(pid) {
            Some(v) => v,
            None => {
                log::debug!("Reaped pid {} (status {}), not a service.", pid, code);
                return false;
            }
        };

        let svc = match self.registry.get_mut(idx) {
            Some(v) => v,
            None => return false,
        };
        svc.set_pid(None);
        svc.set_last_exit_code(code);

        if svc.state() == ServiceState::Stopping {
            log::info!("{} stopped (status {}).", svc.name(), code);
            svc.set_state(ServiceState::Stopped);
        } else if svc.kind() == ServiceKind::OneShot {
            if code == 0 {
                log::info!("{} finished.", svc.name());
                svc.set_state(ServiceState::Stopped);
            } else {
                log::warn!("{} failed (status {}).", svc.name(), code);
                svc.set_state(ServiceState::Failed);
            }
        } else if svc.auto_restart() && svc.restart_count() < svc.max_restarts() {
            svc.inc_restart_count();
            svc.set_state(ServiceState::Stopped);
            log::warn!(
                "{} exited (status {}), restarting ({}/{}).",
                svc.name(),
                code,
                svc.restart_count(),
                svc.max_restarts()
            );
            if let Err(e) = self.start_index(idx) {
                log::error!("Restart failed: {}", e);
            }
        } else {
            log::error!(
                "{} exited (status {}), giving up after {} restarts.",
                svc.name(),
                code,
                svc.restart_count()
            );
            svc.set_state(ServiceState::Failed);
        }

        true
    }

    fn index(&self, name: &str) -> Result<usize> {
        self.registry.index_of(name).ok_or_else(|| {
            log::error!("Service {} not found.", name);
            Error::NotFound {
                name: name.to_string(),
            }
        })
    }

    fn service(&self, idx: usize) -> Result<&Service> {
        self.registry.get(idx).ok_or(Error::NotFound {
            name: format!("#{}", idx),
        })
    }

    fn set_state(&mut self, idx: usize, state: ServiceState) {
        if let Some(svc) = self.registry.get_mut(idx) {
            svc.set_state(state);
        }
    }
}

/// A one-shot dependency counts as done once it is Stopped with a zero
/// exit code. A one-shot that never ran is Stopped with code 0 as well,
/// so it satisfies its dependents too.
fn oneshot_done(dep: &Service) -> bool {
    dep.state() == ServiceState::Stopped && dep.last_exit_code() == 0
}
