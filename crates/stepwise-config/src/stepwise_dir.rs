//! Discovery and management of the `.stepwise/` directory.
//!
//! The `.stepwise/` directory holds a project's database and
//! `config.yaml`. It is found by walking up from the working directory, or
//! taken from the `STEPWISE_DIR` environment variable.

use crate::config::ConfigError;
use std::path::{Path, PathBuf};

/// The name of the stepwise metadata directory.
pub const STEPWISE_DIR_NAME: &str = ".stepwise";

/// Environment variable that overrides directory discovery.
pub const STEPWISE_DIR_ENV: &str = "STEPWISE_DIR";

/// Walk up the directory tree from `start` looking for a `.stepwise/`
/// directory.
///
/// `STEPWISE_DIR` wins when it names an existing directory. Returns `None`
/// if the filesystem root is reached without a match.
///
/// # Examples
///
/// ```no_run
/// use stepwise_config::stepwise_dir::find_stepwise_dir;
/// use std::path::Path;
///
/// if let Some(dir) = find_stepwise_dir(Path::new(".")) {
///     println!("Found stepwise dir at {}", dir.display());
/// }
/// ```
pub fn find_stepwise_dir(start: &Path) -> Option<PathBuf> {
    if let Ok(env_dir) = std::env::var(STEPWISE_DIR_ENV) {
        let env_path = PathBuf::from(&env_dir);
        if env_path.is_dir() {
            return Some(env_path);
        }
    }

    let start = start.canonicalize().ok()?;
    let mut current = start.as_path();
    loop {
        let candidate = current.join(STEPWISE_DIR_NAME);
        if candidate.is_dir() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) if parent != current => current = parent,
            _ => break,
        }
    }

    None
}

/// Like [`find_stepwise_dir`], but a miss is
/// [`ConfigError::StepwiseDirNotFound`].
pub fn find_stepwise_dir_or_error(start: &Path) -> Result<PathBuf, ConfigError> {
    find_stepwise_dir(start).ok_or(ConfigError::StepwiseDirNotFound)
}

/// Ensure a `.stepwise/` directory exists at the given path.
///
/// If `path` is not itself named `.stepwise`, a `.stepwise/` subdirectory is
/// created under it. Returns the path to the `.stepwise/` directory.
///
/// # Errors
///
/// Returns [`ConfigError::ReadError`] if directory creation fails.
pub fn ensure_stepwise_dir(path: &Path) -> Result<PathBuf, ConfigError> {
    let stepwise_dir = if path.ends_with(STEPWISE_DIR_NAME) {
        path.to_path_buf()
    } else {
        path.join(STEPWISE_DIR_NAME)
    };

    std::fs::create_dir_all(&stepwise_dir)?;
    Ok(stepwise_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_dir_in_start() {
        let dir = tempfile::tempdir().unwrap();
        let stepwise = dir.path().join(".stepwise");
        std::fs::create_dir(&stepwise).unwrap();

        let found = find_stepwise_dir(dir.path()).unwrap().canonicalize().unwrap();
        assert_eq!(found, stepwise.canonicalize().unwrap());
    }

    #[test]
    fn finds_dir_from_nested_child() {
        let dir = tempfile::tempdir().unwrap();
        let stepwise = dir.path().join(".stepwise");
        std::fs::create_dir(&stepwise).unwrap();

        let child = dir.path().join("reports").join("q3");
        std::fs::create_dir_all(&child).unwrap();

        let found = find_stepwise_dir(&child).unwrap().canonicalize().unwrap();
        assert_eq!(found, stepwise.canonicalize().unwrap());
    }

    #[test]
    fn or_error_succeeds_when_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".stepwise")).unwrap();
        assert!(find_stepwise_dir_or_error(dir.path()).is_ok());
    }

    #[test]
    fn missing_start_path_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("does-not-exist");
        assert!(find_stepwise_dir(&gone).is_none() || std::env::var(STEPWISE_DIR_ENV).is_ok());
    }

    #[test]
    fn ensure_creates_subdir() {
        let dir = tempfile::tempdir().unwrap();
        let result = ensure_stepwise_dir(dir.path()).unwrap();
        assert!(result.is_dir());
        assert!(result.ends_with(".stepwise"));
    }

    #[test]
    fn ensure_accepts_named_dir_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let stepwise = dir.path().join(".stepwise");
        assert_eq!(ensure_stepwise_dir(&stepwise).unwrap(), stepwise);
        assert_eq!(ensure_stepwise_dir(dir.path()).unwrap(), stepwise);
    }
}
