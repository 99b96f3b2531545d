//! Pod-side naming: application names, the environment file location, and
//! pod root resolution through procfs.
//!
//! ## Layout
//!
//! ```text
//! <pod dir>/
//! └── stage1/rootfs/
//!     └── rkt/env/
//!         ├── nginx        ← one environment file per app
//!         └── sidecar
//!
//! /proc/<pod pid>/root     ← symlink to the pod's root filesystem
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::constants::{ENV_FILE_DIR, MAX_APP_NAME_LEN, STAGE1_ROOTFS_DIR};
use crate::error::{Error, Result};

/// A validated application name.
///
/// Runs of lowercase ASCII letters and digits joined by single `-`, at most
/// [`MAX_APP_NAME_LEN`] bytes. The name is used as a path component, so the
/// rules also rule out traversal (`..`, `/`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppName(String);

impl AppName {
    /// Validates and wraps `name`.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();

        let invalid = |reason: &str| Error::InvalidAppName {
            name: name.clone(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if name.len() > MAX_APP_NAME_LEN {
            return Err(invalid(&format!(
                "name exceeds {} bytes",
                MAX_APP_NAME_LEN
            )));
        }
        if !name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(invalid(
                "only lowercase letters, digits and '-' are allowed",
            ));
        }
        if name.split('-').any(str::is_empty) {
            return Err(invalid("'-' must separate non-empty segments"));
        }

        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AppName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl AsRef<str> for AppName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Returns the stage1 rootfs directory of a pod.
pub fn stage1_rootfs_path(pod_dir: &Path) -> PathBuf {
    pod_dir.join(STAGE1_ROOTFS_DIR)
}

/// Returns the environment file path of `app` inside the pod at `pod_dir`.
pub fn env_file_path(pod_dir: &Path, app: &AppName) -> PathBuf {
    stage1_rootfs_path(pod_dir)
        .join(ENV_FILE_DIR)
        .join(app.as_str())
}

// =============================================================================
// Pod Root
// =============================================================================

/// The root filesystem path of a running pod.
///
/// Only meaningful while the pod process is alive. Never cached: every
/// entry reads `/proc/<pid>/root` again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodRoot {
    pid: String,
    path: PathBuf,
}

impl PodRoot {
    /// Wraps an already-resolved root path.
    pub fn new(pid: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            pid: pid.into(),
            path: path.into(),
        }
    }

    /// The pod process id this root was resolved from.
    pub fn pid(&self) -> &str {
        &self.pid
    }

    /// The resolved root path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Checks that `pid` is a decimal process id.
///
/// The pid becomes a path component under `/proc`; anything but digits
/// could point the root lookup at an arbitrary symlink.
pub fn validate_pid(pid: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidPid {
        pid: pid.to_string(),
        reason: reason.to_string(),
    };

    if pid.is_empty() {
        return Err(invalid("pid is empty"));
    }
    if !pid.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("only decimal digits are allowed"));
    }
    Ok(())
}

/// Returns `<proc_root>/<pid>/root`.
///
/// `pid` must have passed [`validate_pid`].
pub fn root_link_path(proc_root: &Path, pid: &str) -> PathBuf {
    proc_root.join(pid).join("root")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_name_accepts_ac_names() {
        for name in ["nginx", "app-1", "a", "redis-sidecar-2"] {
            assert!(AppName::new(name).is_ok(), "{} should be valid", name);
        }
    }

    #[test]
    fn test_app_name_rejects_bad_names() {
        for name in ["", "Nginx", "../etc", "a/b", "-a", "a-", "a--b", "a b"] {
            assert!(AppName::new(name).is_err(), "{:?} should be invalid", name);
        }
        assert!(AppName::new("a".repeat(MAX_APP_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_env_file_path_layout() {
        let app = AppName::new("nginx").unwrap();
        let path = env_file_path(Path::new("/var/lib/rkt/pods/run/uuid"), &app);
        assert_eq!(
            path,
            PathBuf::from("/var/lib/rkt/pods/run/uuid/stage1/rootfs/rkt/env/nginx")
        );
    }

    #[test]
    fn test_validate_pid() {
        assert!(validate_pid("1").is_ok());
        assert!(validate_pid("4194304").is_ok());
        for pid in ["", "self", "/tmp/x", "../1", "12/..", "-1", " 1"] {
            assert!(
                matches!(validate_pid(pid), Err(Error::InvalidPid { .. })),
                "{:?} should be rejected",
                pid
            );
        }
    }

    #[test]
    fn test_root_link_path() {
        assert_eq!(
            root_link_path(Path::new("/proc"), "1234"),
            PathBuf::from("/proc/1234/root")
        );
    }
}
