//! Dependency environment cache.
//!
//! Saved virtual environments are content-addressed by operating system,
//! interpreter version, and a hash of the lockfile contents. Same lockfile
//! = same key; any lockfile edit invalidates the entry.

use crate::core::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Number of hex characters of the lockfile digest kept in the key.
const HASH_LEN: usize = 12;

/// Cache key for a dependency environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    os: String,
    interpreter: String,
    hash: String,
}

impl CacheKey {
    /// Derives the key for a lockfile on the current operating system.
    pub fn for_lockfile(interpreter_version: &str, lockfile: &Path) -> Result<Self> {
        Ok(Self {
            os: std::env::consts::OS.to_string(),
            interpreter: interpreter_version.to_string(),
            hash: hash_lockfile(lockfile)?,
        })
    }

    /// Builds a key from already-known parts.
    #[must_use]
    pub fn from_parts(
        os: impl Into<String>,
        interpreter: impl Into<String>,
        hash: impl Into<String>,
    ) -> Self {
        Self {
            os: os.into(),
            interpreter: interpreter.into(),
            hash: hash.into(),
        }
    }

    /// Returns the lockfile hash component.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "venv-{}-{}-{}", self.os, self.interpreter, self.hash)
    }
}

/// Hashes a lockfile's contents with SHA-256, keeping the leading hex chars.
fn hash_lockfile(path: &Path) -> Result<String> {
    let contents = fs::read(path).map_err(|e| {
        Error::io(format!("read lockfile {}", path.display()), e)
    })?;

    let mut hasher = Sha256::new();
    hasher.update(&contents);
    let digest = hasher.finalize();

    Ok(hex::encode(&digest[..HASH_LEN / 2]))
}

/// On-disk store of saved dependency environments, one directory per key.
#[derive(Debug)]
pub struct VenvCache {
    root: PathBuf,
}

impl VenvCache {
    /// Opens the cache store, creating its root if needed.
    ///
    /// The default root is `<user-cache-dir>/greenlight`; `override_dir`
    /// comes from `cache.dir` in the configuration.
    pub fn open(override_dir: Option<&Path>) -> Result<Self> {
        let root = match override_dir {
            Some(dir) => dir.to_path_buf(),
            None => dirs::cache_dir()
                .ok_or_else(|| Error::cache("no user cache directory"))?
                .join("greenlight"),
        };

        fs::create_dir_all(&root).map_err(|e| Error::io("create cache root", e))?;

        Ok(Self { root })
    }

    /// Returns the cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the store path for a key.
    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.to_string())
    }

    /// Returns true if an entry exists for the key.
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entry_path(key).is_dir()
    }

    /// Restores the entry for `key` into `dest`.
    ///
    /// Returns false on a miss; a miss is not an error. An existing `dest`
    /// is replaced on a hit.
    pub fn restore(&self, key: &CacheKey, dest: &Path) -> Result<bool> {
        let entry = self.entry_path(key);
        if !entry.is_dir() {
            debug!(key = %key, "Cache miss");
            return Ok(false);
        }

        if dest.exists() {
            fs::remove_dir_all(dest).map_err(|e| Error::io("clear restore target", e))?;
        }

        copy_tree(&entry, dest)?;
        debug!(key = %key, dest = %dest.display(), "Cache hit restored");
        Ok(true)
    }

    /// Saves `src` as the entry for `key`, replacing any previous entry.
    pub fn save(&self, key: &CacheKey, src: &Path) -> Result<()> {
        let entry = self.entry_path(key);
        if entry.exists() {
            fs::remove_dir_all(&entry).map_err(|e| Error::io("replace cache entry", e))?;
        }

        copy_tree(src, &entry)?;
        debug!(key = %key, "Cache entry saved");
        Ok(())
    }

    /// Lists stored entry names.
    pub fn entries(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let dir = fs::read_dir(&self.root).map_err(|e| Error::io("read cache root", e))?;

        for item in dir {
            let item = item.map_err(|e| Error::io("read cache entry", e))?;
            if item.path().is_dir() {
                names.push(item.file_name().to_string_lossy().into_owned());
            }
        }

        names.sort();
        Ok(names)
    }

    /// Removes every stored entry.
    pub fn clear(&self) -> Result<usize> {
        let names = self.entries()?;
        for name in &names {
            fs::remove_dir_all(self.root.join(name))
                .map_err(|e| Error::io("remove cache entry", e))?;
        }
        Ok(names.len())
    }
}

/// Recursively copies a directory tree, recreating symlinks on Unix.
///
/// Virtual environments link their interpreter back into the system
/// installation, so links must survive the round trip rather than being
/// materialized.
fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| Error::cache(format!("walk {}: {e}", src.display())))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::cache(format!("strip prefix: {e}")))?;
        let target = dest.join(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::io("create cache dir", e))?;
        } else if file_type.is_symlink() {
            copy_link(entry.path(), &target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::io("create cache dir", e))?;
            }
            fs::copy(entry.path(), &target).map_err(|e| Error::io("copy cache file", e))?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_link(src: &Path, dest: &Path) -> Result<()> {
    let link_target = fs::read_link(src).map_err(|e| Error::io("read symlink", e))?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io("create cache dir", e))?;
    }
    std::os::unix::fs::symlink(&link_target, dest).map_err(|e| Error::io("create symlink", e))
}

#[cfg(not(unix))]
fn copy_link(src: &Path, dest: &Path) -> Result<()> {
    // Follow the link on platforms without cheap symlink creation.
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io("create cache dir", e))?;
    }
    fs::copy(src, dest).map_err(|e| Error::io("copy cache file", e))?;
    Ok(())
}
