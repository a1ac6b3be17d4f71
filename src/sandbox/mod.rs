//! Execution sandbox
//!
//! Runs a script job in a forked child under a seccomp allow-list filter,
//! with the parent supervising and classifying the child's fate. The child
//! locks out privilege gain, seals itself with the filter and only then
//! runs the job; a forbidden syscall kills it on the spot and the parent
//! reports the signal instead of the exit code.
//!
//! The job closure runs after the filter is installed, so it must not touch
//! anything off the allow-list: no heap growth, no file opens, no spawning.
//! Callers prepare everything up front and hand the sandbox a closure that
//! only computes and writes.

#[cfg(target_os = "linux")]
pub mod filter;

use std::fmt;
use std::io;

use log::warn;
use thiserror::Error;

/// Exit code the child reports when sandbox setup itself fails. Setup
/// failures happen after fork, where no diagnostics channel exists.
pub const SETUP_FAILURE: i32 = 126;

/// How to confine a run.
#[derive(Debug, Clone, Copy)]
pub struct SandboxPolicy {
    /// Fork and seal the child with the syscall filter. On by default;
    /// turning it off executes in the host process, for debugging only.
    pub isolate: bool,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self { isolate: true }
    }
}

/// How a supervised run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The child ran to completion and exited with this code.
    Exited(i32),
    /// The child was killed by this signal, seccomp kills included.
    Signaled(i32),
}

impl ExecutionOutcome {
    pub fn success(&self) -> bool {
        matches!(self, ExecutionOutcome::Exited(0))
    }

    /// Process exit code to propagate for this outcome, shell convention
    /// for signal deaths.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExecutionOutcome::Exited(code) => *code,
            ExecutionOutcome::Signaled(signal) => 128 + signal,
        }
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionOutcome::Exited(code) => write!(f, "exited with code {}", code),
            ExecutionOutcome::Signaled(signal) => write!(f, "killed by signal {}", signal),
        }
    }
}

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("fork failed: {0}")]
    Fork(#[source] io::Error),

    #[error("wait failed: {0}")]
    Wait(#[source] io::Error),
}

/// Run `job` under the policy and report how it ended.
///
/// With isolation on, the job runs in a forked child behind the strict
/// syscall filter and this call blocks until the child is reaped. With
/// isolation off (or on platforms without seccomp) the job runs here,
/// unconfined, and its return value becomes the exit code.
pub fn run_sandboxed<F>(policy: &SandboxPolicy, job: F) -> Result<ExecutionOutcome, SandboxError>
where
    F: FnOnce() -> i32,
{
    if !policy.isolate {
        warn!("isolation disabled, executing in the host process");
        return Ok(ExecutionOutcome::Exited(job()));
    }
    confined(job)
}

#[cfg(target_os = "linux")]
fn confined<F>(job: F) -> Result<ExecutionOutcome, SandboxError>
where
    F: FnOnce() -> i32,
{
    let mut steps = Isolation {
        filter: filter::AllowList::strict(),
        job: Some(job),
    };
    match unsafe { libc::fork() } {
        -1 => Err(SandboxError::Fork(io::Error::last_os_error())),
        0 => {
            // In the child. No logging or unwinding from here on; the only
            // way out is _exit.
            let code = child_body(&mut steps);
            unsafe { libc::_exit(code) }
        }
        pid => wait_for(pid),
    }
}

#[cfg(not(target_os = "linux"))]
fn confined<F>(job: F) -> Result<ExecutionOutcome, SandboxError>
where
    F: FnOnce() -> i32,
{
    warn!("syscall isolation unavailable on this platform, executing unconfined");
    Ok(ExecutionOutcome::Exited(job()))
}

#[cfg(target_os = "linux")]
fn wait_for(pid: libc::pid_t) -> Result<ExecutionOutcome, SandboxError> {
    let mut status: libc::c_int = 0;
    loop {
        let rc = unsafe { libc::waitpid(pid, &mut status, 0) };
        if rc == -1 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(SandboxError::Wait(err));
        }
        if libc::WIFEXITED(status) {
            return Ok(ExecutionOutcome::Exited(libc::WEXITSTATUS(status)));
        }
        if libc::WIFSIGNALED(status) {
            return Ok(ExecutionOutcome::Signaled(libc::WTERMSIG(status)));
        }
        // Stopped or continued; keep waiting for a terminal state.
    }
}

/// The child's setup sequence, split out so the ordering is testable
/// without forking. Sealing before locking privileges would be refused by
/// the kernel; executing before sealing would run the job unconfined.
#[cfg(target_os = "linux")]
trait IsolationSteps {
    fn lock(&mut self) -> Result<(), filter::FilterError>;
    fn seal(&mut self) -> Result<(), filter::FilterError>;
    fn execute(&mut self) -> i32;
}

#[cfg(target_os = "linux")]
fn child_body<S: IsolationSteps>(steps: &mut S) -> i32 {
    // Both steps fail before the filter is live, so stderr still works.
    if let Err(e) = steps.lock() {
        eprintln!("sandbox setup failed: {}", e);
        return SETUP_FAILURE;
    }
    if let Err(e) = steps.seal() {
        eprintln!("sandbox setup failed: {}", e);
        return SETUP_FAILURE;
    }
    steps.execute()
}

#[cfg(target_os = "linux")]
struct Isolation<F: FnOnce() -> i32> {
    filter: filter::AllowList,
    job: Option<F>,
}

#[cfg(target_os = "linux")]
impl<F: FnOnce() -> i32> IsolationSteps for Isolation<F> {
    fn lock(&mut self) -> Result<(), filter::FilterError> {
        filter::lock_privileges()
    }

    fn seal(&mut self) -> Result<(), filter::FilterError> {
        self.filter.install()
    }

    fn execute(&mut self) -> i32 {
        match self.job.take() {
            Some(job) => job(),
            None => SETUP_FAILURE,
        }
    }
}
