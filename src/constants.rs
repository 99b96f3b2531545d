//! # Fly Entry Constants
//!
//! Defines the default environment table, file modes, path components,
//! and exit statuses used by the environment store and the entry step.
//! These constants are the **single source of truth** for values shared
//! between the pod-setup writer and the entry reader.
//!
//! ## Cross-References
//!
//! - [`crate::environment`]: Uses the default table and file modes
//! - [`crate::pod`]: Uses the path components and name limits
//! - [`crate::entry`]: Uses the exit statuses and `/proc` layout

// =============================================================================
// Default Environment
// =============================================================================
//
// The minimum environment every application is started with. A default is
// only written when the application's own environment omits that name.
// =============================================================================

/// Default `PATH` for applications that do not set one.
pub const DEFAULT_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Default login shell.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Default user name (also used for `LOGNAME`).
pub const DEFAULT_USER: &str = "root";

/// Default home directory.
pub const DEFAULT_HOME: &str = "/root";

/// The standard default environment, in emission order.
///
/// Passed explicitly into the write path through
/// [`DefaultEnvironment::standard`](crate::environment::DefaultEnvironment::standard).
pub const DEFAULT_ENV: [(&str, &str); 5] = [
    ("PATH", DEFAULT_PATH),
    ("SHELL", DEFAULT_SHELL),
    ("USER", DEFAULT_USER),
    ("LOGNAME", DEFAULT_USER),
    ("HOME", DEFAULT_HOME),
];

// =============================================================================
// File Layout
// =============================================================================

/// Mode for directories created on the way to an environment file.
pub const ENV_DIR_MODE: u32 = 0o755;

/// Mode of a written environment file.
pub const ENV_FILE_MODE: u32 = 0o644;

/// Stage1 rootfs location relative to the pod directory.
pub const STAGE1_ROOTFS_DIR: &str = "stage1/rootfs";

/// Environment file directory relative to the stage1 rootfs.
pub const ENV_FILE_DIR: &str = "rkt/env";

/// Maximum application name length in bytes.
///
/// **Rationale**: The name becomes a path component; 512 bytes stays well
/// under `PATH_MAX` once joined with the pod directory.
pub const MAX_APP_NAME_LEN: usize = 512;

// =============================================================================
// Process Layout
// =============================================================================

/// Root of the procfs mount used to resolve pod roots.
pub const PROC_ROOT: &str = "/proc";

// =============================================================================
// Exit Statuses
// =============================================================================
//
// Supervisors distinguish "entry tooling failed" from "target binary could
// not start" by these two statuses. A successful entry never returns.
// =============================================================================

/// Exit status when any step before exec fails.
pub const EXIT_SETUP_FAILED: u8 = 1;

/// Exit status when confinement succeeded but exec of the target failed.
pub const EXIT_EXEC_FAILED: u8 = 254;

// =============================================================================
// Logging
// =============================================================================

/// Tracing target of the debug diagnostic channel.
pub const DIAG_TARGET: &str = "diag";

/// Environment variable enabling debug mode for the entry binary.
pub const DEBUG_ENV_VAR: &str = "FLY_ENTER_DEBUG";
