//! Seccomp-BPF syscall filter
//!
//! Builds and installs the classic BPF program for strict script isolation:
//! load the syscall number, compare it against a short allow-list, kill the
//! process on anything else. Installation is one-way; once the filter is in
//! place not even the installer can widen it.

use std::io;

use thiserror::Error;

// BPF instruction classes and the seccomp return actions, as the kernel ABI
// defines them. Kept local so the filter reads as one self-contained unit.
const BPF_LD: u16 = 0x00;
const BPF_W: u16 = 0x00;
const BPF_ABS: u16 = 0x20;
const BPF_JMP: u16 = 0x05;
const BPF_JEQ: u16 = 0x10;
const BPF_K: u16 = 0x00;
const BPF_RET: u16 = 0x06;

const SECCOMP_RET_ALLOW: u32 = 0x7fff_0000;
const SECCOMP_RET_KILL: u32 = 0x0000_0000;

const SECCOMP_MODE_FILTER: libc::c_ulong = 2;

// Offset of the syscall number field in struct seccomp_data.
const SECCOMP_DATA_NR_OFFSET: u32 = 0;

/// One classic BPF instruction, kernel layout.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct SockFilter {
    code: u16,
    jt: u8,
    jf: u8,
    k: u32,
}

/// Filter program header handed to prctl.
#[repr(C)]
struct SockFprog {
    len: libc::c_ushort,
    filter: *const SockFilter,
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("too many syscalls for one filter: {0}")]
    TooManySyscalls(usize),

    #[error("prctl({op}) failed: {source}")]
    Prctl {
        op: &'static str,
        #[source]
        source: io::Error,
    },
}

fn stmt(code: u16, k: u32) -> SockFilter {
    SockFilter {
        code,
        jt: 0,
        jf: 0,
        k,
    }
}

fn jump(code: u16, k: u32, jt: u8, jf: u8) -> SockFilter {
    SockFilter { code, jt, jf, k }
}

/// The set of syscalls an isolated child may make.
#[derive(Debug, Clone)]
pub struct AllowList {
    syscalls: Vec<libc::c_long>,
}

impl AllowList {
    /// The strict list: entropy, signal return, pipe I/O and the two exits.
    /// Everything a sealed run needs; notably no open, mmap or brk, which is
    /// why the child must finish allocating before installation.
    pub fn strict() -> Self {
        Self {
            syscalls: vec![
                libc::SYS_getrandom,
                libc::SYS_rt_sigreturn,
                libc::SYS_read,
                libc::SYS_write,
                libc::SYS_exit,
                libc::SYS_exit_group,
            ],
        }
    }

    pub fn syscalls(&self) -> &[libc::c_long] {
        &self.syscalls
    }

    /// Assemble the filter program. Layout: load the syscall number, one
    /// equality jump per allowed syscall straight to the trailing ALLOW,
    /// fall through to KILL.
    fn assemble(&self) -> Result<Vec<SockFilter>, FilterError> {
        let n = self.syscalls.len();
        if n > u8::MAX as usize - 1 {
            return Err(FilterError::TooManySyscalls(n));
        }
        let mut prog = Vec::with_capacity(n + 3);
        prog.push(stmt(BPF_LD | BPF_W | BPF_ABS, SECCOMP_DATA_NR_OFFSET));
        for (i, sys) in self.syscalls.iter().enumerate() {
            // Skip the remaining jumps plus the KILL to land on ALLOW.
            prog.push(jump(BPF_JMP | BPF_JEQ | BPF_K, *sys as u32, (n - i) as u8, 0));
        }
        prog.push(stmt(BPF_RET | BPF_K, SECCOMP_RET_KILL));
        prog.push(stmt(BPF_RET | BPF_K, SECCOMP_RET_ALLOW));
        Ok(prog)
    }

    /// Install the filter on the calling thread. Requires
    /// [`lock_privileges`] first; irreversible on success.
    pub fn install(&self) -> Result<(), FilterError> {
        let prog = self.assemble()?;
        let header = SockFprog {
            len: prog.len() as libc::c_ushort,
            filter: prog.as_ptr(),
        };
        let rc = unsafe {
            libc::prctl(
                libc::PR_SET_SECCOMP,
                SECCOMP_MODE_FILTER,
                &header as *const SockFprog,
                0,
                0,
            )
        };
        if rc != 0 {
            return Err(FilterError::Prctl {
                op: "PR_SET_SECCOMP",
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }
}

/// Forbid privilege gain for this process and its descendants. The kernel
/// requires it before an unprivileged process may load a seccomp filter.
pub fn lock_privileges() -> Result<(), FilterError> {
    let rc = unsafe { libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) };
    if rc != 0 {
        return Err(FilterError::Prctl {
            op: "PR_SET_NO_NEW_PRIVS",
            source: io::Error::last_os_error(),
        });
    }
    Ok(())
}
