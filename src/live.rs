//! Live patch file: recompiles when the file on disk changes.
//!
//! A failed reload leaves the running patch untouched; the caller decides
//! how to report the error.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::dsl::{self, CompileError};
use crate::vm::Patch;

#[derive(Debug)]
pub enum ReloadError {
    Io(io::Error),
    Compile(CompileError),
}

impl fmt::Display for ReloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReloadError::Io(e) => write!(f, "cannot read patch: {e}"),
            ReloadError::Compile(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ReloadError {}

impl From<io::Error> for ReloadError {
    fn from(e: io::Error) -> Self {
        ReloadError::Io(e)
    }
}

impl From<CompileError> for ReloadError {
    fn from(e: CompileError) -> Self {
        ReloadError::Compile(e)
    }
}

/// A patch file and the modification time of its last load attempt.
pub struct PatchFile {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl PatchFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_modified: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and compile the file, recording its modification time.
    pub fn load(&mut self) -> Result<Patch, ReloadError> {
        self.last_modified = modified(&self.path);
        let source = fs::read_to_string(&self.path)?;
        Ok(dsl::compile(&source)?)
    }

    /// Reload if the file changed since the last attempt.
    pub fn poll(&mut self) -> Option<Result<Patch, ReloadError>> {
        let current = modified(&self.path)?;
        match self.last_modified {
            Some(last) if current <= last => None,
            _ => Some(self.load()),
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
