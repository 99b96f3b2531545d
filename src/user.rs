//! Uid/gid shifting for files written on behalf of a pod.
//!
//! Pods running in a user namespace see host ids offset by a fixed
//! `shift`. Files written by pod setup belong to host root, so before the
//! pod can read them their ownership is moved into the pod's id window.
//!
//! ```text
//! host ids:  0 ........ shift ........ shift+count
//!                        │   pod ids 0..count  │
//! ```
//!
//! The adjustment is a collaborator of the environment store, expressed
//! as the [`OwnershipShifter`] trait. [`ChownShifter`] is the default.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::error::{Error, Result};

/// A uid/gid shift window.
///
/// `shift == 0` or `count == 0` means the pod shares the host's ids and
/// nothing needs to be shifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UidRange {
    /// First host id mapped to pod id 0.
    pub shift: u32,
    /// Number of ids in the window.
    pub count: u32,
}

impl UidRange {
    /// Creates a range.
    pub fn new(shift: u32, count: u32) -> Self {
        Self { shift, count }
    }

    /// A range that performs no shifting.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Returns true if files need their ownership adjusted.
    pub fn is_shifted(&self) -> bool {
        self.shift != 0 && self.count != 0
    }

    /// Maps a pod id to its host id.
    ///
    /// Returns `None` if the id falls outside the window or the result
    /// would overflow.
    pub fn shift_id(&self, id: u32) -> Option<u32> {
        if !self.is_shifted() {
            return Some(id);
        }
        if id >= self.count {
            return None;
        }
        self.shift.checked_add(id)
    }
}

impl fmt::Display for UidRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.shift, self.count)
    }
}

impl FromStr for UidRange {
    type Err = Error;

    /// Parses `"<shift>:<count>"`. An empty string is the identity range.
    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Self::identity());
        }

        let invalid = |reason: &str| Error::InvalidUidRange {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let (shift, count) = s
            .split_once(':')
            .ok_or_else(|| invalid("expected <shift>:<count>"))?;
        let shift = shift
            .parse::<u32>()
            .map_err(|e| invalid(&format!("bad shift: {}", e)))?;
        let count = count
            .parse::<u32>()
            .map_err(|e| invalid(&format!("bad count: {}", e)))?;

        if shift.checked_add(count).is_none() {
            return Err(invalid("shift + count overflows"));
        }

        Ok(Self { shift, count })
    }
}

// =============================================================================
// Ownership Adjustment
// =============================================================================

/// Adjusts on-disk ownership so files fall inside a uid/gid range.
pub trait OwnershipShifter {
    /// Shifts ownership of every path in `paths` into `range`.
    ///
    /// Stops at the first failure.
    fn shift_files(&self, paths: &[&Path], range: &UidRange) -> Result<()>;
}

impl<T: OwnershipShifter + ?Sized> OwnershipShifter for &T {
    fn shift_files(&self, paths: &[&Path], range: &UidRange) -> Result<()> {
        (**self).shift_files(paths, range)
    }
}

/// Default shifter: `chown`s each file to the range's root id, for both
/// owner and group.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChownShifter;

impl OwnershipShifter for ChownShifter {
    fn shift_files(&self, paths: &[&Path], range: &UidRange) -> Result<()> {
        if !range.is_shifted() {
            return Ok(());
        }
        let root_id = range.shift_id(0).ok_or_else(|| Error::InvalidUidRange {
            value: range.to_string(),
            reason: "pod root id falls outside the range".to_string(),
        })?;

        for path in paths {
            std::os::unix::fs::chown(path, Some(root_id), Some(root_id)).map_err(|source| {
                Error::ShiftOwnership {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            debug!(path = %path.display(), uid = root_id, "shifted file ownership");
        }

        Ok(())
    }
}
