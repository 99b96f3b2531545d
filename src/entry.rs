//! # Fly Entry
//!
//! Enters a running pod: resolves the pod root from its pid, restores the
//! application environment, confines the process to the root and replaces
//! the process image with the application's command.
//!
//! ## Step Sequence
//!
//! ```text
//!   resolve root ──► load env ──► chdir ──► chroot ──► exec
//!        │               │          │          │         │
//!        ▼ fail          ▼ fail     ▼ fail     ▼ fail    ▼ fail
//!     exit 1          exit 1     exit 1     exit 1    exit 254
//! ```
//!
//! Every step runs exactly once. There are no retries and no rollback:
//! once the root is changed the only ways out are a successful exec or
//! process termination.
//!
//! `Chdir` must precede `Chroot` so the working directory lies inside the
//! new root.
//!
//! ## Exit Statuses
//!
//! | Status | Meaning                                       |
//! |--------|-----------------------------------------------|
//! | 1      | Failed before exec; the target was not reached |
//! | 254    | Confined, but the target could not be started |
//!
//! ## System Seam
//!
//! All process-state changes go through [`EntrySystem`]. [`HostSystem`] is
//! the real implementation; tests drive [`ContainerEntry`] with a recording
//! fake.

use std::ffi::{CString, NulError, OsStr, OsString};
use std::fmt;
use std::io;
use std::os::raw::c_char;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::constants::{DIAG_TARGET, PROC_ROOT};
use crate::environment::read_env_file_as_composed;
use crate::error::{Error, Result};
use crate::pod::{AppName, PodRoot, env_file_path, root_link_path, validate_pid};

// =============================================================================
// Steps
// =============================================================================

/// A step of the entry sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntryStep {
    /// Read `/proc/<pid>/root`.
    ResolveRoot,
    /// Read the app's environment file.
    LoadEnvironment,
    /// Change into the pod root.
    ChangeDirectory,
    /// Change the filesystem root.
    ChangeRoot,
    /// Replace the process image.
    Exec,
}

impl fmt::Display for EntryStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResolveRoot => write!(f, "resolve-root"),
            Self::LoadEnvironment => write!(f, "load-environment"),
            Self::ChangeDirectory => write!(f, "change-directory"),
            Self::ChangeRoot => write!(f, "change-root"),
            Self::Exec => write!(f, "exec"),
        }
    }
}

// =============================================================================
// System Seam
// =============================================================================

/// Process-state operations used by the entry sequence.
pub trait EntrySystem {
    /// Reads the root link of `pid`, a validated decimal pid.
    fn read_root_link(&mut self, pid: &str) -> io::Result<PathBuf>;

    /// Returns the current working directory (the pod directory).
    fn current_dir(&mut self) -> io::Result<PathBuf>;

    /// Changes the working directory.
    fn change_dir(&mut self, path: &Path) -> io::Result<()>;

    /// Changes the filesystem root.
    fn change_root(&mut self, path: &Path) -> io::Result<()>;

    /// Replaces the process image with `argv[0]`.
    ///
    /// Environment entries are passed as raw bytes. Returns only if the
    /// replacement failed.
    fn exec(&mut self, argv: &[String], envv: &[OsString]) -> io::Error;
}

/// The host's real process operations.
#[derive(Debug, Clone)]
pub struct HostSystem {
    proc_root: PathBuf,
}

impl HostSystem {
    /// Uses the host's `/proc`.
    pub fn new() -> Self {
        Self::with_proc_root(PathBuf::from(PROC_ROOT))
    }

    /// Uses an alternate procfs location for root resolution.
    pub fn with_proc_root(proc_root: PathBuf) -> Self {
        Self { proc_root }
    }
}

impl Default for HostSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl EntrySystem for HostSystem {
    fn read_root_link(&mut self, pid: &str) -> io::Result<PathBuf> {
        validate_pid(pid).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        std::fs::read_link(root_link_path(&self.proc_root, pid))
    }

    fn current_dir(&mut self) -> io::Result<PathBuf> {
        std::env::current_dir()
    }

    fn change_dir(&mut self, path: &Path) -> io::Result<()> {
        std::env::set_current_dir(path)
    }

    fn change_root(&mut self, path: &Path) -> io::Result<()> {
        std::os::unix::fs::chroot(path)
    }

    fn exec(&mut self, argv: &[String], envv: &[OsString]) -> io::Error {
        let (argv, envv) = match (to_cstrings(argv), to_cstrings(envv)) {
            (Ok(argv), Ok(envv)) => (argv, envv),
            _ => {
                return io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "argument or environment entry contains a NUL byte",
                );
            }
        };
        let Some(program) = argv.first() else {
            return io::Error::new(io::ErrorKind::InvalidInput, "empty argument list");
        };

        let argv_ptrs = null_terminated(&argv);
        let envv_ptrs = null_terminated(&envv);

        // SAFETY: both pointer arrays are NULL-terminated and point into
        // CStrings that outlive the call. execve only returns on failure.
        unsafe { libc::execve(program.as_ptr(), argv_ptrs.as_ptr(), envv_ptrs.as_ptr()) };

        io::Error::last_os_error()
    }
}

fn to_cstrings<S: AsRef<OsStr>>(items: &[S]) -> std::result::Result<Vec<CString>, NulError> {
    items
        .iter()
        .map(|s| CString::new(s.as_ref().as_bytes()))
        .collect()
}

fn null_terminated(items: &[CString]) -> Vec<*const c_char> {
    items
        .iter()
        .map(|c| c.as_ptr())
        .chain(std::iter::once(std::ptr::null()))
        .collect()
}

// =============================================================================
// Entry
// =============================================================================

/// What to enter and what to run there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRequest {
    /// Pid of the pod's init process.
    pub pid: String,
    /// Application whose environment is restored.
    pub app: AppName,
    /// Target binary path followed by its arguments.
    pub command: Vec<String>,
}

impl EntryRequest {
    /// Creates a request.
    ///
    /// Fails if `pid` is not a decimal process id or `command` is empty.
    pub fn new(pid: impl Into<String>, app: AppName, command: Vec<String>) -> Result<Self> {
        let request = Self {
            pid: pid.into(),
            app,
            command,
        };
        request.validate()?;
        Ok(request)
    }

    /// Re-checks a request whose fields may have been set directly.
    pub fn validate(&self) -> Result<()> {
        validate_pid(&self.pid)?;
        if self.command.is_empty() {
            return Err(Error::EmptyCommand);
        }
        Ok(())
    }
}

/// A pod root with the environment restored and the process confined,
/// ready for exec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confined {
    /// The root the process is now confined to.
    pub root: PodRoot,
    /// Restored `NAME=VALUE` environment, byte for byte.
    pub env: Vec<OsString>,
}

/// Drives the entry sequence over an [`EntrySystem`].
#[derive(Debug)]
pub struct ContainerEntry<S = HostSystem> {
    system: S,
}

impl<S: EntrySystem> ContainerEntry<S> {
    /// Creates an entry over `system`.
    pub fn new(system: S) -> Self {
        Self { system }
    }

    /// Returns the underlying system.
    pub fn system(&self) -> &S {
        &self.system
    }

    /// Consumes the entry, returning the underlying system.
    pub fn into_system(self) -> S {
        self.system
    }

    /// Runs every step up to and including the root change.
    ///
    /// Stops at the first failing step. The request is validated before
    /// anything is touched.
    pub fn confine(&mut self, request: &EntryRequest) -> Result<Confined> {
        request.validate()?;

        debug!(step = %EntryStep::ResolveRoot, pid = %request.pid, "entering pod");
        let root_path = self
            .system
            .read_root_link(&request.pid)
            .map_err(|source| Error::ResolveRoot {
                pid: request.pid.clone(),
                source,
            })?;
        let root = PodRoot::new(request.pid.clone(), root_path);

        debug!(step = %EntryStep::LoadEnvironment, app = %request.app, "loading app environment");
        let pod_dir = self.system.current_dir().map_err(Error::CurrentDir)?;
        let env = read_env_file_as_composed(&env_file_path(&pod_dir, &request.app))?;

        debug!(step = %EntryStep::ChangeDirectory, root = %root.path().display(), "changing to pod root");
        self.system
            .change_dir(root.path())
            .map_err(|source| Error::ChangeDirectory {
                path: root.path().to_path_buf(),
                source,
            })?;

        debug!(step = %EntryStep::ChangeRoot, root = %root.path().display(), "confining to pod root");
        self.system
            .change_root(root.path())
            .map_err(|source| Error::ChangeRoot {
                path: root.path().to_path_buf(),
                source,
            })?;

        Ok(Confined { root, env })
    }

    /// Runs the whole sequence.
    ///
    /// On success the process image is replaced and this never returns.
    /// The returned error is the one that ends the process; its
    /// [`Error::exit_code`] tells the two failure classes apart.
    pub fn enter(&mut self, request: &EntryRequest) -> Error {
        let confined = match self.confine(request) {
            Ok(confined) => confined,
            Err(e) => return e,
        };

        debug!(target: DIAG_TARGET, "PID: {}", request.pid);
        debug!(target: DIAG_TARGET, "APP: {}", request.app);
        debug!(target: DIAG_TARGET, "ARGS: {:?}", request.command);

        info!(
            step = %EntryStep::Exec,
            program = %request.command[0],
            vars = confined.env.len(),
            "executing app"
        );
        let source = self.system.exec(&request.command, &confined.env);

        Error::Exec {
            program: request.command[0].clone(),
            source,
        }
    }
}

impl ContainerEntry<HostSystem> {
    /// Creates an entry over the host system.
    pub fn host() -> Self {
        Self::new(HostSystem::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_are_ordered() {
        assert!(EntryStep::ResolveRoot < EntryStep::LoadEnvironment);
        assert!(EntryStep::ChangeDirectory < EntryStep::ChangeRoot);
        assert!(EntryStep::ChangeRoot < EntryStep::Exec);
        assert_eq!(EntryStep::ChangeRoot.to_string(), "change-root");
    }

    #[test]
    fn test_request_rejects_empty_command() {
        let app = AppName::new("app").unwrap();
        assert!(matches!(
            EntryRequest::new("1", app, vec![]),
            Err(Error::EmptyCommand)
        ));
    }

    #[test]
    fn test_request_rejects_non_numeric_pid() {
        for pid in ["", "/tmp/x", "../1", "self"] {
            let app = AppName::new("app").unwrap();
            assert!(matches!(
                EntryRequest::new(pid, app, vec!["/bin/true".to_string()]),
                Err(Error::InvalidPid { .. })
            ));
        }
    }

    #[test]
    fn test_null_terminated() {
        let items = to_cstrings(&["a".to_string(), "b".to_string()]).unwrap();
        let ptrs = null_terminated(&items);
        assert_eq!(ptrs.len(), 3);
        assert!(ptrs[2].is_null());
    }

    #[test]
    fn test_host_exec_rejects_nul() {
        let err = HostSystem::new().exec(&["/bin/\0true".to_string()], &[]);
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_host_exec_rejects_nul_in_env() {
        let err = HostSystem::new().exec(
            &["/nonexistent/flyenter-target".to_string()],
            &[OsString::from("A=b\0c")],
        );
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_host_exec_missing_binary() {
        let err = HostSystem::new().exec(&["/nonexistent/flyenter-target".to_string()], &[]);
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
