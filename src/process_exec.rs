use std::{
    io,ptr,
    ffi::CString,
    marker::PhantomData,
    os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd},
};

use libc::{
    c_char,c_int,pid_t,
    O_APPEND,O_CREAT,O_TRUNC,O_WRONLY,
    SIGINT,SIGPIPE,SIGQUIT,SIG_DFL,
    STDERR_FILENO,STDIN_FILENO,STDOUT_FILENO,
};
use log::{debug, error};

use crate::parse::{Command, ParseError, Redirect};

/// Added to the signal number when a child is killed by a signal.
pub const SIGNALED_BASE: i32 = 128;

const FILE_MODE: libc::mode_t = 0o644;

/// A redirection ready to be opened inside the child.
#[derive(Debug)]
struct Target {
    path: CString,
    flags: c_int,
    fd: RawFd,
}

impl Target {
    fn new(redirect: &Redirect, fd: RawFd) -> Result<Self, ParseError> {
        let path = CString::new(redirect.path.as_str())
            .map_err(|_| ParseError::NulByte(redirect.path.clone()))?;
        let mode = if redirect.kind.is_append() { O_APPEND } else { O_TRUNC };
        Ok(Self { path, flags: O_WRONLY | O_CREAT | mode, fd })
    }

    /// Open the target and rebind `self.fd` to it.
    fn apply(&self) -> io::Result<()> {
        let opened = unsafe { libc::open(self.path.as_ptr(), self.flags, FILE_MODE as c_int) };
        if opened == -1 {
            return Err(io::Error::last_os_error());
        }
        let result = rebind(opened, self.fd);
        unsafe { libc::close(opened) };
        result
    }
}

/// Everything a child needs to launch one command, built before fork so
/// the child only has to open, dup and exec.
#[derive(Debug)]
pub struct LaunchPlan {
    args: Vec<CString>,
    targets: Vec<Target>,
}

impl LaunchPlan {
    pub fn new(cmd: &Command) -> Result<Self, ParseError> {
        let args = cmd
            .args
            .iter()
            .filter(|a| !a.is_empty())
            .map(|a| CString::new(a.as_str()).map_err(|_| ParseError::NulByte(a.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        let mut targets = Vec::with_capacity(2);
        if let Some(redirect) = &cmd.stdout {
            targets.push(Target::new(redirect, STDOUT_FILENO)?);
        }
        if let Some(redirect) = &cmd.stderr {
            targets.push(Target::new(redirect, STDERR_FILENO)?);
        }

        Ok(Self { args, targets })
    }

    pub fn argv(&self) -> Argv<'_> {
        Argv::new(&self.args)
    }
}

/// Null-terminated pointer array borrowed from the strings it points into.
pub struct Argv<'a> {
    ptrs: Vec<*const c_char>,
    _owner: PhantomData<&'a CString>,
}

impl<'a> Argv<'a> {
    pub fn new(args: &'a [CString]) -> Self {
        let ptrs = args
            .iter()
            .map(|a| a.as_ptr())
            .chain(std::iter::once(ptr::null()))
            .collect();
        Self { ptrs, _owner: PhantomData }
    }

    pub fn as_ptr(&self) -> *const *const c_char {
        self.ptrs.as_ptr()
    }

    /// Number of arguments, excluding the null sentinel.
    pub fn len(&self) -> usize {
        self.ptrs.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn rebind(from: RawFd, to: RawFd) -> io::Result<()> {
    if unsafe { libc::dup2(from, to) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn child_exit(code: c_int) -> ! {
    unsafe { libc::_exit(code) }
}

/// Apply the plan's redirections and replace the process image.
/// Only ever called in a forked child; never returns.
pub fn launch(plan: &LaunchPlan, argv: &Argv<'_>) -> ! {
    // Ignored signals survive exec; the runtime ignores SIGPIPE
    unsafe {
        libc::signal(SIGINT, SIG_DFL);
        libc::signal(SIGQUIT, SIG_DFL);
        libc::signal(SIGPIPE, SIG_DFL);
    }

    for target in &plan.targets {
        if let Err(e) = target.apply() {
            eprintln!("forksh: {}: {e}", target.path.to_string_lossy());
            child_exit(1);
        }
    }

    if argv.is_empty() {
        child_exit(0);
    }

    let program = &plan.args[0];
    unsafe { libc::execvp(program.as_ptr(), argv.as_ptr()) };

    eprintln!("forksh: {}: {}", program.to_string_lossy(), io::Error::last_os_error());
    child_exit(1)
}

/// Fork, running `child` in the new process. The parent sees the pid or
/// the fork error; a child whose closure returns exits with 127.
pub fn spawn<F: FnOnce()>(child: F) -> io::Result<pid_t> {
    match unsafe { libc::fork() } {
        -1 => Err(io::Error::last_os_error()),
        0 => {
            child();
            child_exit(127)
        }
        pid => {
            debug!("spawned pid {pid}");
            Ok(pid)
        }
    }
}

/// Map a raw wait status to the exit status reported to the sequencer.
pub fn decode_status(status: c_int) -> i32 {
    if libc::WIFEXITED(status) {
        libc::WEXITSTATUS(status)
    } else if libc::WIFSIGNALED(status) {
        SIGNALED_BASE + libc::WTERMSIG(status)
    } else {
        1
    }
}

/// Block until `pid` terminates.
pub fn wait_for(pid: pid_t) -> io::Result<i32> {
    let mut status = 0;
    loop {
        if unsafe { libc::waitpid(pid, &mut status, 0) } != -1 {
            let code = decode_status(status);
            debug!("pid {pid} finished with status {code}");
            return Ok(code);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            error!("waitpid({pid}) failed: {err}");
            return Err(err);
        }
    }
}

fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: pipe() just returned two fresh descriptors we now own.
    Ok(unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) })
}

/// Run one command in a child and wait for it.
pub fn run_single(plan: &LaunchPlan) -> io::Result<i32> {
    let argv = plan.argv();
    let pid = spawn(|| launch(plan, &argv))?;
    wait_for(pid)
}

/// Run `left | right`: both children are started before either is waited
/// on. The status of the right-hand command is returned.
pub fn run_pipe(left: &LaunchPlan, right: &LaunchPlan) -> io::Result<i32> {
    let (left_argv, right_argv) = (left.argv(), right.argv());
    let (read, write) = pipe()?;
    let (r, w) = (read.as_raw_fd(), write.as_raw_fd());

    let producer = spawn(|| {
        if rebind(w, STDOUT_FILENO).is_err() {
            child_exit(1);
        }
        unsafe {
            libc::close(r);
            libc::close(w);
        }
        launch(left, &left_argv)
    })?;

    let consumer = spawn(|| {
        if rebind(r, STDIN_FILENO).is_err() {
            child_exit(1);
        }
        unsafe {
            libc::close(w);
            libc::close(r);
        }
        launch(right, &right_argv)
    });

    // The parent uses neither end; the reader only sees EOF once every
    // copy of the write end is closed.
    drop(read);
    drop(write);

    let consumer = match consumer {
        Ok(pid) => pid,
        Err(e) => {
            let _ = wait_for(producer);
            return Err(e);
        }
    };

    let _ = wait_for(producer);
    wait_for(consumer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_command;

    fn plan(text: &str) -> LaunchPlan {
        LaunchPlan::new(&parse_command(text).unwrap()).unwrap()
    }

    #[test]
    fn plan_drops_empty_arguments() {
        let p = plan("'' ls \"\" -l");
        assert_eq!(p.args[0].to_str().unwrap(), "ls");
        assert_eq!(p.argv().len(), 2);
    }

    #[test]
    fn argv_is_null_terminated() {
        let args = vec![CString::new("echo").unwrap(), CString::new("hi").unwrap()];
        let argv = Argv::new(&args);
        assert_eq!(argv.len(), 2);
        let raw = unsafe { std::slice::from_raw_parts(argv.as_ptr(), 3) };
        assert_eq!(raw[0], args[0].as_ptr());
        assert_eq!(raw[1], args[1].as_ptr());
        assert!(raw[2].is_null());
    }

    #[test]
    fn empty_plan_has_no_program() {
        let p = plan("> /dev/null");
        assert!(p.argv().is_empty());
        assert_eq!(p.targets.len(), 1);
    }

    #[test]
    fn target_flags_follow_mode() {
        let p = plan("x > a 2>> b");
        assert_eq!(p.targets[0].fd, STDOUT_FILENO);
        assert_eq!(p.targets[0].flags, O_WRONLY | O_CREAT | O_TRUNC);
        assert_eq!(p.targets[1].fd, STDERR_FILENO);
        assert_eq!(p.targets[1].flags, O_WRONLY | O_CREAT | O_APPEND);
    }

    #[test]
    fn decode_exit_codes() {
        // Linux/BSD wait status layout: exit code in the second byte.
        assert_eq!(decode_status(0), 0);
        assert_eq!(decode_status(3 << 8), 3);
        assert_eq!(decode_status(libc::SIGKILL), SIGNALED_BASE + libc::SIGKILL);
    }
}
