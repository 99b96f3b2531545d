//! # flyenter
//!
//! **Fly-mode entry into a running pod.**
//!
//! In fly mode an application runs directly inside the pod's root filesystem,
//! without a supervising init. This crate provides the two halves of that
//! path:
//!
//! - **Environment files** ([`environment`]): pod setup persists each
//!   application's environment, merged with a small default table, to a
//!   line-oriented file. The entry step reads it back verbatim.
//! - **Entry** ([`entry`]): resolve the pod root from the pod's pid, restore
//!   the environment, `chdir` + `chroot` into the root, then `execve` the
//!   application's command.
//!
//! ```text
//!   pod setup                                 fly-enter --pid P --appname A -- CMD...
//!   ─────────                                 ─────────────────────────────────────
//!   EnvironmentStore::write ──► <pod>/stage1/rootfs/rkt/env/A ──► read_env_file_as_composed
//!                                                                       │
//!                               /proc/P/root ──► chdir ──► chroot ──► execve(CMD, env)
//! ```
//!
//! # Exit Statuses
//!
//! The entry binary never returns on success. On failure it exits with
//! [`EXIT_SETUP_FAILED`] if the target was never reached, or
//! [`EXIT_EXEC_FAILED`] if confinement succeeded but exec did not.
//!
//! # Example
//!
//! ```rust,no_run
//! use flyenter::{AppName, Environment, EnvironmentStore, UidRange, env_file_path};
//! use std::path::Path;
//!
//! # fn main() -> flyenter::Result<()> {
//! let app = AppName::new("nginx")?;
//! let env: Environment = [("PATH", "/custom/bin")].into_iter().collect();
//! let path = env_file_path(Path::new("/var/lib/pods/run/1234"), &app);
//!
//! EnvironmentStore::new().write(&app, &env, &UidRange::identity(), &path)?;
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod entry;
pub mod environment;
pub mod error;
pub mod logging;
pub mod pod;
pub mod user;

// Re-exports
pub use constants::*;
pub use entry::{
    Confined, ContainerEntry, EntryRequest, EntryStep, EntrySystem, HostSystem,
};
pub use environment::{
    DefaultEnvironment, Environment, EnvironmentStore, EnvironmentVariable, compose_environ,
    read_env_file_as_composed, render_env_file,
};
pub use error::{Error, Result};
pub use pod::{AppName, PodRoot, env_file_path, validate_pid};
pub use user::{ChownShifter, OwnershipShifter, UidRange};
