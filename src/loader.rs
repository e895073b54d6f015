//! Module loading entry point. Walks the candidate paths for a module, fetches
//! each through a [`ByteSource`], and returns the first one that verifies and
//! decrypts. Every other outcome becomes one line of the diagnostic trail.

use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::crypto::keys::KeyMaterial;
use crate::crypto::unlock::{unlock, UnlockError};
use crate::resolver::resolve;

/// Capability for fetching whole files by path. `Ok(None)` means not found.
pub trait ByteSource {
    /// Reads the whole file at `path`.
    fn read(&self, path: &str) -> io::Result<Option<Vec<u8>>>;
}

impl<S: ByteSource + ?Sized> ByteSource for &S {
    fn read(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        (**self).read(path)
    }
}

/// Reads candidates from the local filesystem, optionally below a root.
#[derive(Debug, Clone, Default)]
pub struct FsSource {
    root: Option<PathBuf>,
}

impl FsSource {
    /// Source resolving paths against `root`, or the working directory when `None`.
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }
}

impl ByteSource for FsSource {
    fn read(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        let full = match &self.root {
            Some(root) => root.join(path),
            None => PathBuf::from(path),
        };
        match fs::read(&full) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Verified, decrypted source together with the path it came from. The
/// source buffer is wiped when the chunk is dropped.
pub struct Chunk {
    pub name: String,
    pub source: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("name", &self.name)
            .field("len", &self.source.len())
            .finish()
    }
}

/// Why a single candidate was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    NotFound { path: String },
    Unreadable { path: String, reason: String },
    Rejected { path: String, error: UnlockError },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::NotFound { path } => write!(f, "no file \"{path}\""),
            Diagnostic::Unreadable { path, reason } => {
                write!(f, "no file \"{path}\" (unreadable: {reason})")
            }
            Diagnostic::Rejected { path, error } => {
                write!(f, "no file \"{path}\" ({})", error.kind())
            }
        }
    }
}

/// Ordered reasons for every candidate that failed. Renders as an empty first
/// line followed by one line per candidate, matching the host's own
/// module-not-found text so the two can be concatenated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticTrail {
    entries: Vec<Diagnostic>,
}

impl DiagnosticTrail {
    /// Appends the reason for the next failed candidate.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    /// Recorded reasons, in the order the candidates were tried.
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }
}

impl fmt::Display for DiagnosticTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            write!(f, "\n{entry}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{trail}")]
    NotFound {
        module: String,
        trail: DiagnosticTrail,
    },
}

impl LoadError {
    /// Per-candidate reasons behind the failure.
    pub fn trail(&self) -> &DiagnosticTrail {
        match self {
            LoadError::NotFound { trail, .. } => trail,
        }
    }
}

/// Searches for sealed modules using one key set, one byte source and one
/// search path.
pub struct Loader<'k, S> {
    keys: &'k KeyMaterial,
    source: S,
    search_path: String,
}

impl<'k, S: ByteSource> Loader<'k, S> {
    /// Builds a loader that trusts `keys` and reads through `source`.
    pub fn new(keys: &'k KeyMaterial, source: S, search_path: impl Into<String>) -> Self {
        Self {
            keys,
            source,
            search_path: search_path.into(),
        }
    }

    /// Returns the first candidate that verifies and decrypts. A failure on
    /// one candidate never stops the search.
    pub fn load(&self, module_name: &str) -> Result<Chunk, LoadError> {
        let mut trail = DiagnosticTrail::default();

        for path in resolve(module_name, &self.search_path) {
            debug!(module = module_name, %path, "trying candidate");
            let bytes = match self.source.read(&path) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    trail.push(Diagnostic::NotFound { path });
                    continue;
                }
                Err(err) => {
                    warn!(%path, error = %err, "candidate unreadable");
                    trail.push(Diagnostic::Unreadable {
                        path,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            match unlock(self.keys, &bytes) {
                Ok(source) => {
                    info!(module = module_name, %path, len = source.len(), "loaded sealed module");
                    return Ok(Chunk { name: path, source });
                }
                Err(error) => {
                    warn!(%path, kind = error.kind(), "rejected sealed candidate");
                    trail.push(Diagnostic::Rejected { path, error });
                }
            }
        }

        Err(LoadError::NotFound {
            module: module_name.to_string(),
            trail,
        })
    }
}
