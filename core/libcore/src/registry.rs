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
//! The service registry: an arena of services addressed by index or name,
//! kept in registration order.
use crate::{
    error::*,
    service::{Service, ServiceKind},
};
use nix::unistd::Pid;
use std::{fmt::Write, os::unix::prelude::RawFd, path::Path};

/// most services that can be registered
pub const MAX_SERVICES: usize = 64;
/// most argument vector entries per service, argv\[0\] included
pub const MAX_ARGS: usize = 32;
/// most dependencies per service
pub const MAX_DEPS: usize = 16;
/// restart budget of a service that does not set its own
pub const DEFAULT_MAX_RESTARTS: u32 = 5;

/// Owns every declared service.
#[derive(Debug)]
pub struct Registry {
    services: Vec<Service>,
    default_max_restarts: u32,
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

impl Registry {
    ///
    pub fn new() -> Self {
        Registry::with_max_restarts(DEFAULT_MAX_RESTARTS)
    }

    /// create a registry whose services get `max` restarts unless told otherwise
    pub fn with_max_restarts(max: u32) -> Self {
        Registry {
            services: Vec::with_capacity(MAX_SERVICES),
            default_max_restarts: max,
        }
    }

    /// Declare a new service.
    pub fn register(
        &mut self,
        name: &str,
        exec_path: impl AsRef<Path>,
        kind: ServiceKind,
        auto_restart: bool,
    ) -> Result<()> {
        let exec_path = exec_path.as_ref();
        if name.is_empty() || exec_path.as_os_str().is_empty() {
            log::error!("Refusing service with empty name or executable.");
            return Err(Error::Invalid {
                what: format!("service '{}' exec '{}'", name, exec_path.display()),
            });
        }

        if self.index_of(name).is_some() {
            log::error!("Service {} is already registered.", name);
            return Err(Error::DuplicateName {
                name: name.to_string(),
            });
        }

        if self.services.len() >= MAX_SERVICES {
            log::error!("Cannot register {}: too many services.", name);
            return Err(Error::CapacityExceeded {
                what: "services",
                limit: MAX_SERVICES,
            });
        }

        if kind == ServiceKind::Notify {
            log::warn!(
                "{}: notify services have no readiness channel and stay starting until they exit.",
                name
            );
        }

        self.services.push(Service::new(
            name,
            exec_path,
            kind,
            auto_restart,
            self.default_max_restarts,
        ));
        log::debug!(
            "Registered service {} ({}, {}).",
            name,
            exec_path.display(),
            kind
        );
        Ok(())
    }

    /// Append `arg` to the argument vector of `name`.
    pub fn add_argument(&mut self, name: &str, arg: &str) -> Result<()> {
        let svc = self.lookup_mut(name)?;
        if svc.argv().len() >= MAX_ARGS {
            log::error!("{}: too many arguments, dropping '{}'.", name, arg);
            return Err(Error::CapacityExceeded {
                what: "arguments",
                limit: MAX_ARGS,
            });
        }
        svc.push_argument(arg);
        Ok(())
    }

    /// Make `name` depend on `dep`. `dep` does not need to be registered yet.
    pub fn add_dependency(&mut self, name: &str, dep: &str) -> Result<()> {
        let known = self.index_of(dep).is_some();
        let svc = self.lookup_mut(name)?;
        if svc.dependencies().iter().any(|d| d == dep) {
            log::debug!("{}: dependency {} already declared.", name, dep);
            return Ok(());
        }
        if svc.dependencies().len() >= MAX_DEPS {
            log::error!("{}: too many dependencies, dropping '{}'.", name, dep);
            return Err(Error::CapacityExceeded {
                what: "dependencies",
                limit: MAX_DEPS,
            });
        }
        svc.push_dependency(dep);
        if !known {
            log::info!("{}: dependency {} is not registered (yet).", name, dep);
        }
        Ok(())
    }

    /// Enable socket activation of `name` on the unix socket at `path`.
    pub fn set_socket_path(&mut self, name: &str, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::Invalid {
                what: format!("{}: empty socket path", name),
            });
        }
        self.lookup_mut(name)?.set_socket_path(path);
        Ok(())
    }

    /// Override the restart budget of `name`.
    pub fn set_max_restarts(&mut self, name: &str, max: u32) -> Result<()> {
        self.lookup_mut(name)?.set_max_restarts(max);
        Ok(())
    }

    ///
    pub fn find(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name() == name)
    }

    ///
    pub fn find_mut(&mut self, name: &str) -> Option<&mut Service> {
        self.services.iter_mut().find(|s| s.name() == name)
    }

    /// registration index of `name`
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.services.iter().position(|s| s.name() == name)
    }

    ///
    pub fn get(&self, index: usize) -> Option<&Service> {
        self.services.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Service> {
        self.services.get_mut(index)
    }

    /// index of the service that owns the process `pid`
    pub fn find_by_pid(&self, pid: Pid) -> Option<usize> {
        self.services.iter().position(|s| s.pid() == Some(pid))
    }

    /// index of the service listening on `fd`
    pub fn find_by_listen_fd(&self, fd: RawFd) -> Option<usize> {
        self.services.iter().position(|s| s.listen_fd() == Some(fd))
    }

    /// services in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Service> {
        self.services.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Service> {
        self.services.iter_mut()
    }

    ///
    pub fn len(&self) -> usize {
        self.services.len()
    }

    ///
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// A human readable table of every service, one line each.
    pub fn status_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<20} {:<10} {:<8} RESTARTS",
            "SERVICE", "STATE", "PID"
        );
        for svc in self.services.iter() {
            let pid = match svc.pid() {
                Some(p) => p.to_string(),
                None => "-".to_string(),
            };
            let _ = writeln!(
                out,
                "{:<20} {:<10} {:<8} {}/{}",
                svc.name(),
                svc.state(),
                pid,
                svc.restart_count(),
                svc.max_restarts()
            );
        }
        out
    }

    fn lookup_mut(&mut self, name: &str) -> Result<&mut Service> {
        match self.find_mut(name) {
            Some(svc) => Ok(svc),
            None => {
                log::error!("Service {} not found.", name);
                Err(Error::NotFound {
                    name: name.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServiceState;

    #[test]
    fn test_register_and_find() {
        let mut reg = Registry::new();
        reg.register("syslog", "/sbin/syslogd", ServiceKind::Simple, true)
            .unwrap();
        reg.register("network", "/sbin/ifup", ServiceKind::OneShot, false)
            .unwrap();

        assert_eq!(reg.len(), 2);
        assert_eq!(reg.index_of("network"), Some(1));
        let svc = reg.find("syslog").unwrap();
        assert_eq!(svc.exec_path(), Path::new("/sbin/syslogd"));
        assert_eq!(svc.max_restarts(), DEFAULT_MAX_RESTARTS);
        assert!(reg.find("sshd").is_none());

        let names: Vec<&str> = reg.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["syslog", "network"]);
    }

    #[test]
    fn test_register_duplicate() {
        let mut reg = Registry::new();
        reg.register("syslog", "/sbin/syslogd", ServiceKind::Simple, true)
            .unwrap();
        let ret = reg.register("syslog", "/sbin/other", ServiceKind::OneShot, false);
        assert!(matches!(ret, Err(Error::DuplicateName { .. })));
        assert_eq!(reg.len(), 1);
        assert_eq!(
            reg.find("syslog").unwrap().exec_path(),
            Path::new("/sbin/syslogd")
        );
    }

    #[test]
    fn test_register_invalid() {
        let mut reg = Registry::new();
        assert!(reg.register("", "/bin/true", ServiceKind::Simple, false).is_err());
        assert!(reg.register("x", "", ServiceKind::Simple, false).is_err());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_service_capacity() {
        let mut reg = Registry::new();
        for i in 0..MAX_SERVICES {
            reg.register(&format!("svc{}", i), "/bin/true", ServiceKind::Simple, false)
                .unwrap();
        }
        let ret = reg.register("one-too-many", "/bin/true", ServiceKind::Simple, false);
        assert!(matches!(ret, Err(Error::CapacityExceeded { .. })));
        assert_eq!(reg.len(), MAX_SERVICES);
    }

    #[test]
    fn test_arguments() {
        let mut reg = Registry::new();
        reg.register("getty", "/sbin/agetty", ServiceKind::Simple, true)
            .unwrap();
        reg.add_argument("getty", "tty1").unwrap();
        reg.add_argument("getty", "115200").unwrap();
        assert_eq!(
            reg.find("getty").unwrap().argv(),
            &["/sbin/agetty", "tty1", "115200"]
        );

        for _ in 3..MAX_ARGS {
            reg.add_argument("getty", "-x").unwrap();
        }
        assert_eq!(reg.find("getty").unwrap().argv().len(), MAX_ARGS);
        let ret = reg.add_argument("getty", "overflow");
        assert!(matches!(ret, Err(Error::CapacityExceeded { .. })));
        assert_eq!(reg.find("getty").unwrap().argv().len(), MAX_ARGS);

        let ret = reg.add_argument("nobody", "x");
        assert!(matches!(ret, Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_dependencies() {
        let mut reg = Registry::new();
        reg.register("web", "/bin/httpd", ServiceKind::Simple, false)
            .unwrap();
        /* unknown names are accepted */
        reg.add_dependency("web", "network").unwrap();
        reg.add_dependency("web", "network").unwrap();
        assert_eq!(reg.find("web").unwrap().dependencies(), &["network"]);

        for i in 1..MAX_DEPS {
            reg.add_dependency("web", &format!("dep{}", i)).unwrap();
        }
        let ret = reg.add_dependency("web", "dep-overflow");
        assert!(matches!(ret, Err(Error::CapacityExceeded { .. })));
        assert_eq!(reg.find("web").unwrap().dependencies().len(), MAX_DEPS);

        let ret = reg.add_dependency("nobody", "web");
        assert!(matches!(ret, Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_socket_and_restarts() {
        let mut reg = Registry::with_max_restarts(2);
        reg.register("lazy", "/bin/lazyd", ServiceKind::Simple, true)
            .unwrap();
        assert_eq!(reg.find("lazy").unwrap().max_restarts(), 2);
        reg.set_max_restarts("lazy", 7).unwrap();
        assert_eq!(reg.find("lazy").unwrap().max_restarts(), 7);

        reg.set_socket_path("lazy", "/run/lazy.sock").unwrap();
        assert_eq!(
            reg.find("lazy").unwrap().socket_path(),
            Some(Path::new("/run/lazy.sock"))
        );
        assert!(reg.set_socket_path("lazy", "").is_err());
        assert!(reg.set_socket_path("ghost", "/run/g.sock").is_err());
    }

    #[test]
    fn test_lookup_by_pid_and_fd() {
        let mut reg = Registry::new();
        reg.register("a", "/bin/a", ServiceKind::Simple, false).unwrap();
        reg.register("b", "/bin/b", ServiceKind::Simple, false).unwrap();
        reg.get_mut(1).unwrap().set_pid(Some(Pid::from_raw(4242)));
        reg.get_mut(0).unwrap().set_listen_fd(Some(9));

        assert_eq!(reg.find_by_pid(Pid::from_raw(4242)), Some(1));
        assert_eq!(reg.find_by_pid(Pid::from_raw(1)), None);
        assert_eq!(reg.find_by_listen_fd(9), Some(0));
        assert_eq!(reg.find_by_listen_fd(10), None);
    }

    #[test]
    fn test_status_table() {
        let mut reg = Registry::new();
        reg.register("syslog", "/sbin/syslogd", ServiceKind::Simple, true)
            .unwrap();
        reg.register("network", "/sbin/ifup", ServiceKind::OneShot, false)
            .unwrap();
        {
            let svc = reg.get_mut(0).unwrap();
            svc.set_state(ServiceState::Running);
            svc.set_pid(Some(Pid::from_raw(321)));
        }

        let table = reg.status_table();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("SERVICE"));
        assert!(lines[1].starts_with("syslog"));
        assert!(lines[1].contains("RUNNING"));
        assert!(lines[1].contains("321"));
        assert!(lines[1].ends_with("0/5"));
        assert!(lines[2].contains("STOPPED"));
        assert!(lines[2].contains(" - "));
    }
}
