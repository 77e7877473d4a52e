//! Write-once chunk cache backed by a flat directory.
//!
//! Every cached chunk lives under a [`CacheKey`] that names its file as
//! `{outer:03}-{inner:04}.chunk`. Keys are immutable: the first `put` for a
//! key wins and every later attempt fails with
//! [`DuplicateKey`](crate::ChunkIoError::DuplicateKey), leaving the stored
//! bytes untouched. Writers stage to a hidden temp file and publish it via
//! a hard link, so readers never observe a partially written entry.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chunk_core::{Chunk, SceneChunk};

use crate::error::{ChunkIoError, Result};
use crate::format;

/// File extension of cached chunk entries.
pub const CHUNK_EXT: &str = "chunk";

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identifies one cache entry as an `(outer, inner)` pair.
///
/// The outer index groups entries (epoch for train caches, scene ordinal
/// for eval caches) and the inner index numbers entries within the group.
/// The derived ordering sorts by outer first, matching the lexical order
/// of the zero-padded file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    /// Epoch or scene ordinal.
    pub outer: u32,
    /// Element index within the outer group.
    pub inner: u32,
}

impl CacheKey {
    /// Creates a new cache key.
    #[inline]
    pub const fn new(outer: u32, inner: u32) -> Self {
        Self { outer, inner }
    }

    /// File name of this key, e.g. `003-0042.chunk`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self, CHUNK_EXT)
    }

    /// Parses a cache file name back into its key.
    ///
    /// Returns `None` for anything that is not a chunk entry (staging
    /// files, manifests, stray files).
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(".chunk")?;
        let (outer, inner) = stem.split_once('-')?;
        Some(Self {
            outer: outer.parse().ok()?,
            inner: inner.parse().ok()?,
        })
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}-{:04}", self.outer, self.inner)
    }
}

/// Directory-backed chunk cache with write-once keys.
#[derive(Debug, Clone)]
pub struct ChunkCache {
    root: PathBuf,
}

impl ChunkCache {
    /// Opens a cache at `root`, creating the directory if needed.
    pub fn create<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Opens an existing cache directory.
    pub fn open<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ChunkIoError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("cache directory {} does not exist", root.display()),
            )));
        }
        Ok(Self { root })
    }

    /// Root directory of the cache.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores a train-schema chunk under `key`.
    ///
    /// # Errors
    /// Returns [`DuplicateKey`](ChunkIoError::DuplicateKey) if the key is
    /// already present. The stored entry is never modified.
    pub fn put(&self, key: &CacheKey, chunk: &Chunk) -> Result<()> {
        self.put_with(key, |writer| format::save_chunk(chunk, writer))
    }

    /// Stores an eval-schema chunk (with provenance) under `key`.
    pub fn put_traced(&self, key: &CacheKey, chunk: &SceneChunk) -> Result<()> {
        self.put_with(key, |writer| format::save_scene_chunk(chunk, writer))
    }

    /// Loads a train-schema chunk.
    pub fn load(&self, key: &CacheKey) -> Result<Chunk> {
        let path = self.key_path(key);
        let mut reader = BufReader::new(File::open(&path)?);
        format::load_chunk(&mut reader).map_err(|err| err.at_path(&path))
    }

    /// Loads an eval-schema chunk including its provenance.
    pub fn load_traced(&self, key: &CacheKey) -> Result<SceneChunk> {
        let path = self.key_path(key);
        let mut reader = BufReader::new(File::open(&path)?);
        format::load_scene_chunk(&mut reader).map_err(|err| err.at_path(&path))
    }

    /// Whether an entry exists for `key`.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.key_path(key).exists()
    }

    /// All stored keys in ascending `(outer, inner)` order.
    pub fn keys(&self) -> Result<Vec<CacheKey>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if let Some(key) = CacheKey::from_file_name(name) {
                    keys.push(key);
                }
            }
        }
        keys.sort_unstable();
        Ok(keys)
    }

    fn key_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    fn staging_path(&self, key: &CacheKey) -> PathBuf {
        let nonce = STAGING_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.root
            .join(format!(".{}.{}.{}.tmp", key, std::process::id(), nonce))
    }

    fn put_with<F>(&self, key: &CacheKey, write_payload: F) -> Result<()>
    where
        F: FnOnce(&mut BufWriter<File>) -> Result<()>,
    {
        let final_path = self.key_path(key);
        if final_path.exists() {
            return Err(ChunkIoError::DuplicateKey { path: final_path });
        }

        let staging = self.staging_path(key);
        if let Err(err) = write_staged(&staging, write_payload) {
            let _ = fs::remove_file(&staging);
            return Err(err);
        }

        // The hard link publishes the finished payload under its final name
        // in one step: a key only ever appears with complete content, and
        // concurrent writers race to a single winner.
        let linked = fs::hard_link(&staging, &final_path);
        let _ = fs::remove_file(&staging);

        match linked {
            Ok(()) => {
                log::debug!("cached {}", final_path.display());
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                Err(ChunkIoError::DuplicateKey { path: final_path })
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn write_staged<F>(path: &Path, write_payload: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    write_payload(&mut writer)?;
    writer.flush()?;
    Ok(())
}
