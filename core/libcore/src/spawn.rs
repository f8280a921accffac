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
//! Process creation for services.
//!
//! Everything the child needs is prepared before `fork()`: between fork
//! and exec the child only issues raw syscalls, it never allocates, locks
//! or logs.
use crate::error::*;
use nix::{
    errno::Errno,
    fcntl::{self, FcntlArg},
    libc::{self, c_char},
    sys::signal::{self, pthread_sigmask, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow},
    unistd::{self, AccessFlags, ForkResult, Pid},
};
use std::{
    ffi::CString,
    os::unix::{ffi::OsStrExt, prelude::RawFd},
    path::Path,
};

/// status a child exits with when it could not be set up or exec'ed
pub const EXIT_EXEC: i32 = 127;
/// first descriptor handed to an activated service
pub const LISTEN_FDS_START: RawFd = 3;

const FIXED_ENV: [&str; 3] = ["PATH=/bin:/sbin:/usr/bin:/usr/sbin", "HOME=/", "TERM=linux"];
const LISTEN_PID_PREFIX: &[u8] = b"LISTEN_PID=";

/// What a launched process inherits from the supervisor besides its
/// command line: the activation descriptors, exported as `LISTEN_FDS`
/// together with `LISTEN_PID` naming the process that owns them. The
/// owner is the child itself, so the pid is filled in after the fork.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchContext {
    fds: Vec<RawFd>,
}

impl LaunchContext {
    ///
    pub fn new() -> Self {
        LaunchContext::default()
    }

    /// hand `fds` to the child, in order, starting at descriptor 3
    pub fn with_fds(fds: Vec<RawFd>) -> Self {
        LaunchContext { fds }
    }

    ///
    pub fn fds(&self) -> &[RawFd] {
        &self.fds
    }

    /// The environment known before the fork. `LISTEN_PID` is not part of
    /// it: the child appends that entry once it knows its own pid.
    pub fn environment(&self) -> Vec<String> {
        let mut envs: Vec<String> = FIXED_ENV.iter().map(|s| s.to_string()).collect();
        if !self.fds.is_empty() {
            envs.push(format!("LISTEN_FDS={}", self.fds.len()));
        }
        envs
    }
}

/// A command line ready to be handed to execve.
#[derive(Debug, Clone)]
pub struct ExecCommand {
    path: CString,
    argv: Vec<CString>,
}

impl ExecCommand {
    /// `argv` is the complete vector, argv\[0\] included.
    pub fn new(path: &Path, argv: &[String]) -> Result<Self> {
        let path = CString::new(path.as_os_str().as_bytes()).context(NulSnafu)?;
        let argv = argv
            .iter()
            .map(|a| CString::new(a.as_bytes()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .context(NulSnafu)?;
        Ok(ExecCommand { path, argv })
    }

    ///
    pub fn path(&self) -> &CString {
        &self.path
    }

    ///
    pub fn argv(&self) -> &[CString] {
        &self.argv
    }
}

/// The seam between the supervisor and the operating system's process
/// primitives.
pub trait Spawner {
    /// `path` names an existing regular file the supervisor may execute
    fn is_executable(&self, path: &Path) -> bool;

    /// Start `cmd` in a new process and return its pid.
    fn spawn(&self, cmd: &ExecCommand, ctx: &LaunchContext) -> Result<Pid, Errno>;

    /// Deliver `sig` to `pid` without waiting for any outcome.
    fn kill(&self, pid: Pid, sig: signal::Signal) -> Result<(), Errno>;
}

/// fork + execve
#[derive(Debug, Default)]
pub struct ForkSpawner;

impl Spawner for ForkSpawner {
    fn is_executable(&self, path: &Path) -> bool {
        path.is_file() && unistd::access(path, AccessFlags::X_OK).is_ok()
    }

    fn spawn(&self, cmd: &ExecCommand, ctx: &LaunchContext) -> Result<Pid, Errno> {
        let argv: Vec<*const c_char> = cmd
            .argv()
            .iter()
            .map(|a| a.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect();

        let envs = ctx
            .environment()
            .into_iter()
            .map(CString::new)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| Errno::EINVAL)?;

        let mut envp: Vec<*const c_char> = envs.iter().map(|e| e.as_ptr()).collect();
        let mut pid_slot = None;
        if !ctx.fds().is_empty() {
            pid_slot = Some(envp.len());
            envp.push(std::ptr::null());
        }
        envp.push(std::ptr::null());

        let mut fds = ctx.fds().to_vec();

        match unsafe { unistd::fork() } {
            Ok(ForkResult::Parent { child }) => Ok(child),
            Ok(ForkResult::Child) => exec_child(cmd, &mut fds, &argv, &mut envp, pid_slot),
            Err(e) => Err(e),
        }
    }

    fn kill(&self, pid: Pid, sig: signal::Signal) -> Result<(), Errno> {
        signal::kill(pid, sig)
    }
}

fn exec_child(
    cmd: &ExecCommand,
    fds: &mut [RawFd],
    argv: &[*const c_char],
    envp: &mut [*const c_char],
    pid_slot: Option<usize>,
) -> ! {
    reset_signals();

    if unistd::setsid().is_err() || unistd::chdir("/").is_err() {
        child_exit();
    }

    if !shift_fds(fds) {
        child_exit();
    }

    let mut pid_buf = [0u8; 32];
    if let Some(slot) = pid_slot {
        format_listen_pid(unistd::getpid(), &mut pid_buf);
        envp[slot] = pid_buf.as_ptr() as *const c_char;
    }

    unsafe {
        libc::execve(cmd.path().as_ptr(), argv.as_ptr(), envp.as_ptr());
    }
    child_exit()
}

fn child_exit() -> ! {
    unsafe { libc::_exit(EXIT_EXEC) }
}

/// Undo the supervisor's signal setup: every disposition back to default
/// and nothing blocked.
fn reset_signals() {
    let dfl = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    for sig in signal::Signal::iterator() {
        if sig == signal::Signal::SIGKILL || sig == signal::Signal::SIGSTOP {
            continue;
        }
        let _ = unsafe { signal::sigaction(sig, &dfl) };
    }
    let _ = pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::empty()), None);
}

/// Move fds\[i\] to 3+i without close-on-exec. Descriptors first go above
/// the target range so that no target slot clobbers a source still to be
/// moved, then drop into place.
fn shift_fds(fds: &mut [RawFd]) -> bool {
    let n = fds.len() as RawFd;
    if n == 0 {
        return true;
    }

    let mut high = [0 as RawFd; 16];
    if fds.len() > high.len() {
        return false;
    }

    for (i, fd) in fds.iter().enumerate() {
        match fcntl::fcntl(*fd, FcntlArg::F_DUPFD(LISTEN_FDS_START + n)) {
            Ok(v) => high[i] = v,
            Err(_) => return false,
        }
    }

    for fd in fds.iter() {
        if *fd < LISTEN_FDS_START || *fd >= LISTEN_FDS_START + n {
            let _ = unistd::close(*fd);
        }
    }

    for (i, fd) in fds.iter_mut().enumerate() {
        let target = LISTEN_FDS_START + i as RawFd;
        if unistd::dup2(high[i], target).is_err() {
            return false;
        }
        let _ = unistd::close(high[i]);
        *fd = target;
    }

    true
}

/// Write "LISTEN_PID=<pid>\0" into `buf` without allocating.
fn format_listen_pid(pid: Pid, buf: &mut [u8; 32]) -> usize {
    let mut pos = LISTEN_PID_PREFIX.len();
    buf[..pos].copy_from_slice(LISTEN_PID_PREFIX);

    let mut digits = [0u8; 12];
    let mut len = 0;
    let mut v = pid.as_raw().unsigned_abs();
    loop {
        digits[len] = b'0' + (v % 10) as u8;
        len += 1;
        v /= 10;
        if v == 0 {
            break;
        }
    }
    while len > 0 {
        len -= 1;
        buf[pos] = digits[len];
        pos += 1;
    }
    buf[pos] = 0;
    pos
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::wait::{waitpid, WaitStatus};
    use std::ffi::CStr;

    fn sh(script: &str) -> ExecCommand {
        ExecCommand::new(
            Path::new("/bin/sh"),
            &["/bin/sh".to_string(), "-c".to_string(), script.to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_format_listen_pid() {
        let mut buf = [0u8; 32];
        let len = format_listen_pid(Pid::from_raw(4096), &mut buf);
        let s = CStr::from_bytes_with_nul(&buf[..=len]).unwrap();
        assert_eq!(s.to_str().unwrap(), "LISTEN_PID=4096");

        let len = format_listen_pid(Pid::from_raw(7), &mut buf);
        assert_eq!(&buf[..len], b"LISTEN_PID=7");
    }

    #[test]
    fn test_environment() {
        let ctx = LaunchContext::new();
        assert_eq!(
            ctx.environment(),
            vec!["PATH=/bin:/sbin:/usr/bin:/usr/sbin", "HOME=/", "TERM=linux"]
        );

        let ctx = LaunchContext::with_fds(vec![11, 12]);
        let env = ctx.environment();
        assert_eq!(env.len(), 4);
        assert_eq!(env[3], "LISTEN_FDS=2");
        assert!(!env.iter().any(|e| e.starts_with("LISTEN_PID=")));
    }

    #[test]
    fn test_exec_command_nul() {
        assert!(ExecCommand::new(Path::new("/bin/true"), &["a\0b".to_string()]).is_err());
        let cmd = ExecCommand::new(Path::new("/bin/true"), &["/bin/true".to_string()]).unwrap();
        assert_eq!(cmd.argv().len(), 1);
    }

    #[test]
    fn test_is_executable() {
        let spawner = ForkSpawner;
        assert!(spawner.is_executable(Path::new("/bin/sh")));
        assert!(!spawner.is_executable(Path::new("/nonexistent/daemon")));
        assert!(!spawner.is_executable(Path::new("/")));
    }

    #[test]
    fn test_spawn_exit_code() {
        let pid = ForkSpawner.spawn(&sh("exit 3"), &LaunchContext::new()).unwrap();
        assert_eq!(waitpid(pid, None).unwrap(), WaitStatus::Exited(pid, 3));
    }

    #[test]
    fn test_spawn_environment_and_session() {
        let script = "test \"$HOME\" = / && test \"$TERM\" = linux && \
                      test \"$(pwd)\" = / && test -z \"$LISTEN_FDS\"";
        let pid = ForkSpawner.spawn(&sh(script), &LaunchContext::new()).unwrap();
        assert_eq!(waitpid(pid, None).unwrap(), WaitStatus::Exited(pid, 0));
    }

    #[test]
    fn test_spawn_listen_fds() {
        let (r, w) = unistd::pipe2(nix::fcntl::OFlag::O_CLOEXEC).unwrap();
        let script = "test \"$LISTEN_FDS\" = 1 && test \"$LISTEN_PID\" = \"$$\" && \
                      echo hi >&3";
        let ctx = LaunchContext::with_fds(vec![w]);
        let pid = ForkSpawner.spawn(&sh(script), &ctx).unwrap();
        assert_eq!(waitpid(pid, None).unwrap(), WaitStatus::Exited(pid, 0));

        unistd::close(w).unwrap();
        let mut buf = [0u8; 8];
        let n = unistd::read(r, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"hi\n");
        unistd::close(r).unwrap();
    }

    #[test]
    fn test_spawn_exec_failure() {
        let cmd = ExecCommand::new(
            Path::new("/nonexistent/daemon"),
            &["/nonexistent/daemon".to_string()],
        )
        .unwrap();
        let pid = ForkSpawner.spawn(&cmd, &LaunchContext::new()).unwrap();
        assert_eq!(
            waitpid(pid, None).unwrap(),
            WaitStatus::Exited(pid, EXIT_EXEC)
        );
    }
}
