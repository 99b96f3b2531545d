//! # Application Environment Files
//!
//! Persists an application's environment variables to a line-oriented file
//! during pod setup, and reads them back at entry time.
//!
//! ## File Format
//!
//! ```text
//! SHELL=/bin/sh          ← defaults the app did not set, in table order
//! USER=root
//! LOGNAME=root
//! HOME=/root
//! PATH=/custom/bin       ← the app's own variables, in the order given
//! ```
//!
//! One `NAME=VALUE` per line, each line newline-terminated. There is no
//! escaping, so names and values containing a newline are rejected on
//! write, as are names that are empty or contain `=`.
//!
//! ## Reading Is Lenient
//!
//! [`read_env_file_as_composed`] returns each line as opaque bytes. It
//! checks neither the `NAME=VALUE` shape nor the encoding; whatever
//! consumes the list decides what to do with odd lines.
//!
//! ## Duplicates
//!
//! Variables are written verbatim, duplicates included. Where a single
//! value is needed the last occurrence wins (see [`Environment::get`]).
//!
//! ## Lifecycle
//!
//! Written once by pod setup, then read any number of times. There is no
//! locking; setup always finishes before the first entry. Writes go to a
//! sibling temp file which is renamed over the destination, so readers
//! never observe a half-written file.

use std::ffi::OsString;
use std::fs::{self, DirBuilder, OpenOptions, Permissions};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::ffi::OsStringExt;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::constants::{DEFAULT_ENV, ENV_DIR_MODE, ENV_FILE_MODE};
use crate::error::{Error, Result};
use crate::pod::AppName;
use crate::user::{ChownShifter, OwnershipShifter, UidRange};

// =============================================================================
// Environment Types
// =============================================================================

/// A single environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentVariable {
    /// Variable name.
    pub name: String,
    /// Variable value.
    pub value: String,
}

impl EnvironmentVariable {
    /// Creates a variable.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Formats the variable as `NAME=VALUE`.
    pub fn compose(&self) -> String {
        format!("{}={}", self.name, self.value)
    }

    /// Checks that the variable survives the line format unchanged.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidEnvironment {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if self.name.contains('=') {
            return Err(invalid("name contains '='"));
        }
        if self.name.contains(['\n', '\r']) {
            return Err(invalid("name contains a line break"));
        }
        if self.value.contains(['\n', '\r']) {
            return Err(invalid("value contains a line break"));
        }
        if self.name.contains('\0') || self.value.contains('\0') {
            return Err(invalid("contains a NUL byte"));
        }
        Ok(())
    }
}

/// An ordered list of environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: Vec<EnvironmentVariable>,
}

impl Environment {
    /// Creates an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of `name`, taking the last occurrence.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .rev()
            .find(|v| v.name == name)
            .map(|v| v.value.as_str())
    }

    /// Returns true if `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.iter().any(|v| v.name == name)
    }

    /// Sets `name`, replacing an existing entry in place or appending.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.vars.iter_mut().rev().find(|v| v.name == name) {
            Some(existing) => existing.value = value,
            None => self.vars.push(EnvironmentVariable { name, value }),
        }
    }

    /// Appends a variable without looking for an existing entry.
    pub fn push(&mut self, var: EnvironmentVariable) {
        self.vars.push(var);
    }

    /// Iterates the variables in order.
    pub fn iter(&self) -> std::slice::Iter<'_, EnvironmentVariable> {
        self.vars.iter()
    }

    /// Number of entries, duplicates included.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl FromIterator<EnvironmentVariable> for Environment {
    fn from_iter<I: IntoIterator<Item = EnvironmentVariable>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(n, v)| EnvironmentVariable::new(n, v))
            .collect()
    }
}

impl<'a> IntoIterator for &'a Environment {
    type Item = &'a EnvironmentVariable;
    type IntoIter = std::slice::Iter<'a, EnvironmentVariable>;

    fn into_iter(self) -> Self::IntoIter {
        self.vars.iter()
    }
}

// =============================================================================
// Default Environment
// =============================================================================

/// Fallback values for variables every application expects.
///
/// Immutable once built. [`DefaultEnvironment::standard`] is the table pod
/// setup uses; tests can build their own with [`DefaultEnvironment::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultEnvironment {
    entries: Vec<(String, String)>,
}

impl DefaultEnvironment {
    /// Builds a table from `(name, value)` pairs, kept in the given order.
    pub fn new<N, V>(entries: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }

    /// The standard table: `PATH`, `SHELL`, `USER`, `LOGNAME`, `HOME`.
    pub fn standard() -> Self {
        Self::new(DEFAULT_ENV)
    }

    /// Iterates the `(name, value)` pairs in emission order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl Default for DefaultEnvironment {
    fn default() -> Self {
        Self::standard()
    }
}

// =============================================================================
// Serialization
// =============================================================================

/// Renders the file contents for `env` merged with `defaults`.
///
/// Defaults come first and only for names `env` does not contain; then
/// every entry of `env` in order.
pub fn render_env_file(defaults: &DefaultEnvironment, env: &Environment) -> Result<String> {
    for var in env {
        var.validate()?;
    }

    let mut out = String::new();
    for (name, value) in defaults.iter() {
        if !env.contains(name) {
            out.push_str(name);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
    }
    for var in env {
        out.push_str(&var.compose());
        out.push('\n');
    }
    Ok(out)
}

/// Formats `env` as `NAME=VALUE` strings, preserving order.
pub fn compose_environ(env: &Environment) -> Vec<String> {
    env.iter().map(EnvironmentVariable::compose).collect()
}

/// Reads an environment file as a list of raw lines.
///
/// Lines are split on `\n` with a trailing `\r` dropped, and are otherwise
/// passed through byte for byte, whatever their encoding. Any I/O failure,
/// including one after some lines were read, fails the whole call.
pub fn read_env_file_as_composed(path: &Path) -> Result<Vec<OsString>> {
    let read_err = |source| Error::ReadFile {
        path: path.to_path_buf(),
        source,
    };

    let file = fs::File::open(path).map_err(read_err)?;
    let mut lines = Vec::new();
    for line in BufReader::new(file).split(b'\n') {
        let mut line = line.map_err(read_err)?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        lines.push(OsString::from_vec(line));
    }

    debug!(path = %path.display(), lines = lines.len(), "read environment file");
    Ok(lines)
}

// =============================================================================
// Environment Store
// =============================================================================

/// Writes application environment files.
///
/// Carries the default table and the ownership collaborator so both can be
/// substituted.
#[derive(Debug, Clone)]
pub struct EnvironmentStore<S = ChownShifter> {
    defaults: DefaultEnvironment,
    shifter: S,
}

impl EnvironmentStore {
    /// Creates a store with the standard defaults and `chown` shifting.
    pub fn new() -> Self {
        Self::with_parts(DefaultEnvironment::standard(), ChownShifter)
    }
}

impl Default for EnvironmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: OwnershipShifter> EnvironmentStore<S> {
    /// Creates a store from an explicit default table and shifter.
    pub fn with_parts(defaults: DefaultEnvironment, shifter: S) -> Self {
        Self { defaults, shifter }
    }

    /// Returns the default table.
    pub fn defaults(&self) -> &DefaultEnvironment {
        &self.defaults
    }

    /// Writes the environment file of `app` to `path`.
    ///
    /// Creates missing parent directories (mode `0755`), writes the file
    /// (mode `0644`, replacing any previous file), then shifts its ownership
    /// into `range`. Invalid variables are rejected before anything touches
    /// the filesystem.
    pub fn write(
        &self,
        app: &AppName,
        env: &Environment,
        range: &UidRange,
        path: &Path,
    ) -> Result<()> {
        let contents = render_env_file(&self.defaults, env)?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            DirBuilder::new()
                .recursive(true)
                .mode(ENV_DIR_MODE)
                .create(parent)
                .map_err(|source| Error::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        write_replace(path, contents.as_bytes())?;

        self.shifter.shift_files(&[path], range)?;

        info!(
            app = %app,
            path = %path.display(),
            vars = env.len(),
            "wrote app environment"
        );
        Ok(())
    }

    /// Reads an environment file back. See [`read_env_file_as_composed`].
    pub fn read(&self, path: &Path) -> Result<Vec<OsString>> {
        read_env_file_as_composed(path)
    }
}

/// Writes `data` to a sibling temp file, then renames it over `path`.
fn write_replace(path: &Path, data: &[u8]) -> Result<()> {
    let write_err = |source| Error::WriteFile {
        path: path.to_path_buf(),
        source,
    };

    let temp_path = temp_sibling(path);
    let result = (|| {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(ENV_FILE_MODE)
            .open(&temp_path)?;
        file.write_all(data)?;
        // The umask may have narrowed the create mode.
        file.set_permissions(Permissions::from_mode(ENV_FILE_MODE))?;
        fs::rename(&temp_path, path)
    })();

    result.map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        write_err(e)
    })
}

/// `<dir>/.<file name>.tmp.<uuid>`
fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp.{}", name, uuid::Uuid::now_v7()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_skips_supplied_defaults() {
        let env: Environment = [("PATH", "/custom/bin")].into_iter().collect();
        let rendered = render_env_file(&DefaultEnvironment::standard(), &env).unwrap();

        assert_eq!(
            rendered,
            "SHELL=/bin/sh\nUSER=root\nLOGNAME=root\nHOME=/root\nPATH=/custom/bin\n"
        );
    }

    #[test]
    fn test_render_with_custom_defaults() {
        let defaults = DefaultEnvironment::new([("TERM", "xterm")]);
        let rendered = render_env_file(&defaults, &Environment::new()).unwrap();
        assert_eq!(rendered, "TERM=xterm\n");
    }

    #[test]
    fn test_render_keeps_duplicates() {
        let env: Environment = [("A", "1"), ("A", "2")].into_iter().collect();
        let rendered = render_env_file(&DefaultEnvironment::new(Vec::<(&str, &str)>::new()), &env).unwrap();
        assert_eq!(rendered, "A=1\nA=2\n");
        assert_eq!(env.get("A"), Some("2"));
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut env = Environment::new();
        env.set("A", "1");
        env.set("B", "2");
        env.set("A", "3");
        assert_eq!(compose_environ(&env), vec!["A=3", "B=2"]);
    }

    #[test]
    fn test_validate_rejects_unrepresentable() {
        assert!(EnvironmentVariable::new("A", "x\ny").validate().is_err());
        assert!(EnvironmentVariable::new("A=B", "x").validate().is_err());
        assert!(EnvironmentVariable::new("", "x").validate().is_err());
        assert!(EnvironmentVariable::new("A", "x=y").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_nul() {
        assert!(matches!(
            EnvironmentVariable::new("A", "x\0y").validate(),
            Err(Error::InvalidEnvironment { .. })
        ));
        assert!(EnvironmentVariable::new("A\0B", "x").validate().is_err());
    }

    #[test]
    fn test_temp_sibling_stays_in_dir() {
        let temp = temp_sibling(Path::new("/pod/rkt/env/nginx"));
        assert_eq!(temp.parent(), Some(Path::new("/pod/rkt/env")));
        assert!(temp.to_string_lossy().contains(".nginx.tmp."));
    }
}
