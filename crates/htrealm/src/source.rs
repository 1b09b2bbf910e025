//! Cached views over flat credential files.
//!
//! Every file is parsed lazily: a lookup first compares the file's current
//! modification time with the one observed at the last successful parse and
//! re-reads the whole file on any mismatch. Each path is represented by a
//! single cache entry inside a [`SourceRegistry`]; lookups on one entry are
//! serialized by its own mutex so a reader never sees a half-built index.

use crate::error::{Error, ReadSourceSnafu};
use crate::record::{is_comment, sanitize_identifier, split_key_data};
use dashmap::DashMap;
use parking_lot::Mutex;
use snafu::ResultExt;
use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error};

/// Line-oriented index built from one source file.
trait Index: Default {
    /// Feeds one raw line into the index; returns `false` if it was skipped.
    fn ingest(&mut self, line: &str) -> bool;
}

/// `key:data` lines, keyed by the sanitized key.
#[derive(Debug, Default)]
struct KeyValueIndex {
    entries: HashMap<String, String>,
}

impl Index for KeyValueIndex {
    fn ingest(&mut self, line: &str) -> bool {
        if is_comment(line) {
            return false;
        }
        let Some((key, data)) = split_key_data(line) else {
            return false;
        };
        let key = sanitize_identifier(key);
        if key.is_empty() {
            return false;
        }
        // Last line wins.
        self.entries.insert(key.into_owned(), data.to_owned());
        true
    }
}

/// `group: user1 user2 ...` lines, inverted into user -> groups.
#[derive(Debug, Default)]
struct GroupIndex {
    memberships: HashMap<String, BTreeSet<String>>,
}

impl Index for GroupIndex {
    fn ingest(&mut self, line: &str) -> bool {
        if is_comment(line) {
            return false;
        }
        let Some((group, members)) = split_key_data(line) else {
            return false;
        };
        let group = sanitize_identifier(group);
        if group.is_empty() {
            return false;
        }
        for member in members.split(' ') {
            let user = sanitize_identifier(member);
            if user.is_empty() {
                if !member.is_empty() {
                    debug!(member, %group, "skip user in group");
                }
                continue;
            }
            self.memberships
                .entry(user.into_owned())
                .or_default()
                .insert(group.clone().into_owned());
        }
        true
    }
}

/// One parsed file plus the modification time it was parsed at.
#[derive(Debug)]
struct CachedFile<I> {
    path: PathBuf,
    observed: Option<SystemTime>,
    index: I,
}

impl<I: Index> CachedFile<I> {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            observed: None,
            index: I::default(),
        }
    }

    fn reset(&mut self) {
        self.index = I::default();
        self.observed = None;
    }

    /// Re-parses the file if it changed since the last successful parse.
    ///
    /// A missing file empties the index without being an error. Any other
    /// failure also empties it and leaves the entry marked stale.
    fn revalidate(&mut self) -> Result<(), Error> {
        let modified = match fs::metadata(&self.path) {
            Ok(meta) => meta.modified().ok(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                error!(path = %self.path.display(), "file not found");
                self.reset();
                return Ok(());
            }
            Err(source) => {
                self.reset();
                return Err(source).context(ReadSourceSnafu { path: &self.path });
            }
        };

        if modified.is_some() && modified == self.observed {
            debug!(path = %self.path.display(), "using cached file");
            return Ok(());
        }

        debug!(path = %self.path.display(), "parsing file");
        self.reset();
        self.index = parse(&self.path)?;
        self.observed = modified;
        Ok(())
    }
}

/// Streams `path` into a fresh index.
fn parse<I: Index>(path: &Path) -> Result<I, Error> {
    let file = File::open(path).context(ReadSourceSnafu { path })?;
    let mut index = I::default();
    for line in BufReader::new(file).lines() {
        let line = line.context(ReadSourceSnafu { path })?;
        if !index.ingest(&line) {
            debug!(line = line.as_str(), "skip line");
        }
    }
    Ok(index)
}

/// A key and its raw remainder as found in a `key:data` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Sanitized key the record is stored under.
    pub key: String,
    /// Everything after the first `:` of the line.
    pub data: String,
}

/// Shared handle to the cache entry of one `key:data` file.
#[derive(Debug, Clone)]
pub struct KeyValueSource {
    path: PathBuf,
    cached: Arc<Mutex<CachedFile<KeyValueIndex>>>,
}

impl KeyValueSource {
    fn new(path: PathBuf) -> Self {
        Self {
            cached: Arc::new(Mutex::new(CachedFile::new(path.clone()))),
            path,
        }
    }

    /// Absolute path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Looks up `key`, surfacing read failures.
    pub fn try_lookup(&self, key: &str) -> Result<Option<Record>, Error> {
        let mut cached = self.cached.lock();
        cached.revalidate()?;
        match cached.index.entries.get_key_value(key) {
            Some((stored, data)) => {
                debug!(key, path = %self.path.display(), "key found");
                Ok(Some(Record {
                    key: stored.clone(),
                    data: data.clone(),
                }))
            }
            None => {
                debug!(key, path = %self.path.display(), "key not found");
                Ok(None)
            }
        }
    }

    /// Looks up `key`; unreadable files answer `None`.
    pub fn lookup(&self, key: &str) -> Option<Record> {
        self.try_lookup(key).unwrap_or_else(|err| {
            error!(error = %snafu::Report::from_error(err), "unable to parse file");
            None
        })
    }

    /// Whether both handles point at the same cache entry.
    pub fn shares_cache_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cached, &other.cached)
    }
}

/// Shared handle to the cache entry of one group file.
#[derive(Debug, Clone)]
pub struct GroupSource {
    path: PathBuf,
    cached: Arc<Mutex<CachedFile<GroupIndex>>>,
}

impl GroupSource {
    fn new(path: PathBuf) -> Self {
        Self {
            cached: Arc::new(Mutex::new(CachedFile::new(path.clone()))),
            path,
        }
    }

    /// Absolute path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Groups listing `username`, surfacing read failures.
    pub fn try_groups_of(&self, username: &str) -> Result<BTreeSet<String>, Error> {
        let mut cached = self.cached.lock();
        cached.revalidate()?;
        match cached.index.memberships.get(username) {
            Some(groups) => {
                debug!(username, path = %self.path.display(), "username found");
                Ok(groups.clone())
            }
            None => {
                debug!(username, path = %self.path.display(), "username not found");
                Ok(BTreeSet::new())
            }
        }
    }

    /// Groups listing `username`; unreadable files answer the empty set.
    pub fn groups_of(&self, username: &str) -> BTreeSet<String> {
        self.try_groups_of(username).unwrap_or_else(|err| {
            error!(error = %snafu::Report::from_error(err), "unable to parse file");
            BTreeSet::new()
        })
    }

    /// Whether both handles point at the same cache entry.
    pub fn shares_cache_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cached, &other.cached)
    }
}

/// Process-wide table of cache entries, one per absolute file path.
///
/// Create one registry and hand it (usually behind an [`Arc`]) to every
/// component that reads credential files.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    key_value: DashMap<PathBuf, KeyValueSource>,
    groups: DashMap<PathBuf, GroupSource>,
}

impl SourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The `key:data` source for `path`, created on first use.
    pub fn key_value(&self, path: impl AsRef<Path>) -> KeyValueSource {
        let path = absolutize(path.as_ref());
        self.key_value
            .entry(path.clone())
            .or_insert_with(|| KeyValueSource::new(path))
            .clone()
    }

    /// The group source for `path`, created on first use.
    pub fn groups(&self, path: impl AsRef<Path>) -> GroupSource {
        let path = absolutize(path.as_ref());
        self.groups
            .entry(path.clone())
            .or_insert_with(|| GroupSource::new(path))
            .clone()
    }

    /// Number of cache entries held.
    pub fn len(&self) -> usize {
        self.key_value.len() + self.groups.len()
    }

    /// Whether no cache entry was created yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
