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
//! Socket activation: one listening unix socket per activation-enabled
//! service, created before boot and watched while its service is stopped.
use crate::{
    registry::Registry,
    service::ServiceState,
    supervisor::{StartOutcome, Supervisor},
};
use basic::{fd_util, socket_util};
use std::os::unix::prelude::RawFd;

/// listen backlog of activation sockets
pub const DEFAULT_BACKLOG: usize = 8;

/// Creates and tears down the activation sockets.
#[derive(Debug, Clone)]
pub struct SocketActivation {
    backlog: usize,
}

impl Default for SocketActivation {
    fn default() -> Self {
        SocketActivation::new(DEFAULT_BACKLOG)
    }
}

impl SocketActivation {
    ///
    pub fn new(backlog: usize) -> Self {
        SocketActivation { backlog }
    }

    /// Open a listener for every service with a socket path. A service whose
    /// socket cannot be created is left without one. Returns the number of
    /// listeners opened.
    pub fn setup(&self, registry: &mut Registry) -> usize {
        let mut opened = 0;
        for svc in registry.iter_mut() {
            let path = match svc.socket_path() {
                Some(p) => p.to_path_buf(),
                None => continue,
            };
            if svc.listen_fd().is_some() {
                continue;
            }

            match socket_util::unix_listen(&path, self.backlog) {
                Ok(fd) => {
                    log::info!(
                        "{}: listening on {} (fd {}).",
                        svc.name(),
                        path.display(),
                        fd
                    );
                    svc.set_listen_fd(Some(fd));
                    opened += 1;
                }
                Err(e) => {
                    log::error!(
                        "{}: failed to listen on {}: {}",
                        svc.name(),
                        path.display(),
                        e
                    );
                }
            }
        }
        opened
    }

    /// Listeners that should wake the event loop: those of stopped services.
    pub fn watch_fds(registry: &Registry) -> Vec<RawFd> {
        registry
            .iter()
            .filter(|s| s.state() == ServiceState::Stopped)
            .filter_map(|s| s.listen_fd())
            .collect()
    }

    /// A listener became readable: start its service if it is still
    /// stopped. The pending connection stays queued for the service to
    /// accept. Returns whether a process was launched.
    pub fn dispatch(supervisor: &mut Supervisor, fd: RawFd) -> bool {
        let idx = match supervisor.registry().find_by_listen_fd(fd) {
            Some(v) => v,
            None => {
                log::warn!("Activity on unknown listener fd {}.", fd);
                return false;
            }
        };
        let (name, state) = match supervisor.registry().get(idx) {
            Some(s) => (s.name().to_string(), s.state()),
            None => return false,
        };
        if state != ServiceState::Stopped {
            return false;
        }

        log::info!("Connection on {} socket, activating.", name);
        match supervisor.start(&name) {
            Ok(StartOutcome::Launched(_)) => true,
            Ok(_) => false,
            Err(e) => {
                log::error!("Activation of {} failed: {}", name, e);
                false
            }
        }
    }

    /// Close every listener and remove its socket file.
    pub fn cleanup(registry: &mut Registry) {
        for svc in registry.iter_mut() {
            let fd = match svc.listen_fd() {
                Some(fd) => fd,
                None => continue,
            };
            fd_util::close(fd);
            svc.set_listen_fd(None);
            if let Some(path) = svc.socket_path() {
                if let Err(e) = std::fs::remove_file(path) {
                    log::debug!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }
    }
}
