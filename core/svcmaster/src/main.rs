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

//! svcmaster: a small pid 1 that boots services in dependency order,
//! supervises them and takes the machine down on request.

mod loader;
mod mount;

extern crate clap;
use clap::Parser;
use log::Level;
use nix::sys::stat::{umask, Mode};
use nix::unistd::{self, Pid};
use std::path::Path;
use svcore::{
    activation::SocketActivation,
    config::ManagerConfig,
    error::*,
    registry::Registry,
    runtime::Runtime,
    shutdown::{LinuxOps, Shutdown},
    signals::SignalBridge,
    spawn::ForkSpawner,
    supervisor::Supervisor,
};

/// parse program arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(long, value_name = "PATH")]
    /// Load the manager configuration from PATH.
    config: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    prepare_init();

    /* Start from a known state, the signal bridge registers what we
     * handle later on. */
    ignore_all_signals();

    /* /dev/kmsg needs /dev, so mounting comes before the logger and
     * the outcome is logged afterwards. */
    let mounts = mount::setup_mount_early();

    let manager_config = ManagerConfig::new(args.config.as_deref());
    let level = match manager_config.LogLevel.parse::<Level>() {
        Ok(v) => v,
        Err(_) => {
            eprintln!(
                "unsupported log level {}, set log level to info",
                manager_config.LogLevel
            );
            Level::Info
        }
    };
    log::init_log(
        "svcmaster",
        level,
        log::parse_targets(&manager_config.LogTarget),
    );
    log::info!("svcmaster version: {}", env!("CARGO_PKG_VERSION"));
    if unistd::getpid() != Pid::from_raw(1) {
        log::warn!("not running as pid 1, orphaned processes will not be reaped.");
    }
    mounts.log();

    let mut registry = Registry::with_max_restarts(manager_config.DefaultMaxRestarts);
    loader::load_dir(&mut registry, Path::new(&manager_config.ServiceDir));

    let bridge = SignalBridge::new()?;
    bridge.install()?;

    let activation = SocketActivation::new(manager_config.ListenBacklog);
    activation.setup(&mut registry);

    let mut supervisor = Supervisor::new(registry, Box::new(ForkSpawner));
    let report = supervisor.start_all();
    if !report.is_complete() {
        log::warn!("Boot is incomplete.");
    }
    for line in supervisor.registry().status_table().lines() {
        log::info!("{}", line);
    }

    let shutdown = Shutdown::new(Box::new(LinuxOps), manager_config.shutdown_grace());
    Runtime::new(supervisor, bridge, manager_config.PollTimeoutMSec).run(shutdown)
}

fn prepare_init() {
    // common umask
    let mode = Mode::from_bits_truncate(0o77);
    umask(umask(mode) | Mode::from_bits_truncate(0o22));
}

fn ignore_all_signals() {
    /* nix::sys::signal::Signal doesn't support SIGRTMAX, use libc. */
    for sig in 1..libc::SIGRTMAX() + 1 {
        if [libc::SIGKILL, libc::SIGSTOP].contains(&sig) {
            continue;
        }

        let mut sig_action: libc::sigaction = unsafe { std::mem::zeroed() };
        sig_action.sa_flags = libc::SA_RESTART;
        sig_action.sa_sigaction = libc::SIG_IGN;
        /* Some signals are reserved by libc, failing on those is fine. */
        unsafe { libc::sigaction(sig, &sig_action, std::ptr::null_mut()) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args() {
        let args = Args::parse_from(["svcmaster"]);
        assert!(args.config.is_none());

        let args = Args::parse_from(["svcmaster", "--config", "/tmp/system.conf"]);
        assert_eq!(args.config.as_deref(), Some("/tmp/system.conf"));

        assert!(Args::try_parse_from(["svcmaster", "--bogus"]).is_err());
    }
}
