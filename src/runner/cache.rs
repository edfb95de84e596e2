//! Checksum cache for tasks with `source` and `target`
//!
//! A task's stored checksum lives at `<cache dir>/<hash of config path>/<hash of task name>`.
//! Hashing both parts keeps entries for different projects apart and keeps file
//! names safe whatever characters a task name uses.
//!
//! Computing a checksum walks every glob match on one producer thread, hashes
//! file contents on a pool of workers, and combines the per-file digests on
//! the calling thread after sorting them by path.

use crate::error::{CacheError, CacheResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use blake3::Hasher;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, trace};

/// Per-task checksum store
#[derive(Debug, Clone)]
pub struct Cache {
    /// Cache directory
    dir: PathBuf,
    /// Whether caching is enabled
    enabled: bool,
}

impl Cache {
    /// Create a cache rooted at `dir`, or at the user cache directory when `None`
    pub fn new(dir: Option<PathBuf>) -> CacheResult<Self> {
        let dir = match dir {
            Some(dir) => dir,
            None => directories::ProjectDirs::from("", "", "errand")
                .map(|d| d.cache_dir().to_path_buf())
                .ok_or(CacheError::NoCacheDir)?,
        };

        Ok(Self { dir, enabled: true })
    }

    /// Create a disabled cache (no-op)
    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            enabled: false,
        }
    }

    /// Check if cache is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Directory holding every entry for one config file
    pub fn project_dir(&self, config_path: &Path) -> PathBuf {
        let absolute = fs::canonicalize(config_path).unwrap_or_else(|_| config_path.to_path_buf());
        let key = blake3::hash(absolute.to_string_lossy().as_bytes());
        self.dir.join(key.to_hex().as_str())
    }

    /// File holding the stored checksum for one task
    pub fn task_file(&self, config_path: &Path, task_name: &str) -> PathBuf {
        let key = blake3::hash(task_name.as_bytes());
        self.project_dir(config_path).join(key.to_hex().as_str())
    }

    /// Stored checksum for a task, if any
    pub fn lookup(&self, config_path: &Path, task_name: &str) -> CacheResult<Option<String>> {
        if !self.enabled {
            return Ok(None);
        }

        let path = self.task_file(config_path, task_name);
        match fs::read_to_string(&path) {
            Ok(stored) => Ok(Some(stored.trim().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Read { path, source }),
        }
    }

    /// Persist a task's checksum
    pub fn store(&self, config_path: &Path, task_name: &str, checksum: &str) -> CacheResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let path = self.task_file(config_path, task_name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| CacheError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(&path, checksum).map_err(|source| CacheError::Write { path, source })?;
        debug!(task = task_name, "stored checksum");
        Ok(())
    }

    /// Whether the stored checksum equals `checksum`
    pub fn is_up_to_date(
        &self,
        config_path: &Path,
        task_name: &str,
        checksum: &str,
    ) -> CacheResult<bool> {
        Ok(self.lookup(config_path, task_name)?.as_deref() == Some(checksum))
    }

    /// Remove every stored checksum
    pub fn clean_all(&self) -> CacheResult<()> {
        self.remove_dir(&self.dir)
    }

    /// Remove the stored checksums of one config file
    pub fn clean_project(&self, config_path: &Path) -> CacheResult<()> {
        self.remove_dir(&self.project_dir(config_path))
    }

    /// Remove the stored checksum of one task
    pub fn clean_task(&self, config_path: &Path, task_name: &str) -> CacheResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let path = self.task_file(config_path, task_name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Write { path, source }),
        }
    }

    fn remove_dir(&self, dir: &Path) -> CacheResult<()> {
        if !self.enabled {
            return Ok(());
        }

        match fs::remove_dir_all(dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Write {
                path: dir.to_path_buf(),
                source,
            }),
        }
    }
}

/// Digest of one matched path
#[derive(Debug)]
struct FileDigest {
    path: PathBuf,
    hash: blake3::Hash,
}

/// Shared state for one checksum run
struct Pipeline<'a> {
    root: &'a Path,
    cancelled: AtomicBool,
    failure: Mutex<Option<CacheError>>,
}

impl Pipeline<'_> {
    fn fail(&self, error: CacheError) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Ok(mut failure) = self.failure.lock() {
            if failure.is_none() {
                *failure = Some(error);
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Expand every glob and queue each distinct match once
    fn produce(&self, patterns: &[String], jobs: SyncSender<PathBuf>) {
        let mut seen = HashSet::new();
        let root = glob::Pattern::escape(&self.root.to_string_lossy());

        for pattern in patterns {
            let full = if Path::new(pattern).is_absolute() {
                pattern.clone()
            } else {
                format!("{}/{}", root, pattern)
            };

            let paths = match glob::glob(&full) {
                Ok(paths) => paths,
                Err(e) => {
                    self.fail(CacheError::Pattern {
                        pattern: pattern.clone(),
                        error: e.to_string(),
                    });
                    return;
                }
            };

            let mut matched = false;
            for entry in paths {
                if self.is_cancelled() {
                    return;
                }

                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        let path = e.path().to_path_buf();
                        self.fail(CacheError::Read {
                            path,
                            source: e.into_error(),
                        });
                        return;
                    }
                };

                matched = true;
                if seen.insert(path.clone()) && jobs.send(path).is_err() {
                    return;
                }
            }

            if !matched {
                self.fail(CacheError::NoMatch(pattern.clone()));
                return;
            }
        }
    }

    /// Hash queued paths until the queue closes or the run is cancelled
    fn work(&self, jobs: Arc<Mutex<Receiver<PathBuf>>>, results: SyncSender<FileDigest>) {
        loop {
            let next = match jobs.lock() {
                Ok(queue) => queue.recv(),
                Err(_) => {
                    self.fail(CacheError::Worker("job queue poisoned".to_string()));
                    return;
                }
            };

            let Ok(path) = next else {
                return;
            };

            if self.is_cancelled() {
                return;
            }

            match hash_path(self.root, &path) {
                Ok(digest) => {
                    if results.send(digest).is_err() {
                        return;
                    }
                }
                Err(error) => {
                    self.fail(error);
                    return;
                }
            }
        }
    }
}

/// Hash one path: its relative name, a type tag, and its contents
fn hash_path(root: &Path, path: &Path) -> CacheResult<FileDigest> {
    let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
    let read_error = |source| CacheError::Read {
        path: path.to_path_buf(),
        source,
    };

    let metadata = fs::symlink_metadata(path).map_err(read_error)?;
    let mut hasher = Hasher::new();
    hasher.update(relative.to_string_lossy().as_bytes());
    hasher.update(&[0]);

    let file_type = metadata.file_type();
    if file_type.is_symlink() {
        hasher.update(b"symlink");
        let target = fs::read_link(path).map_err(read_error)?;
        hasher.update(target.to_string_lossy().as_bytes());
    } else if file_type.is_dir() {
        hasher.update(b"dir");
    } else {
        hasher.update(b"file");
        let mut file = File::open(path).map_err(read_error)?;
        io::copy(&mut file, &mut hasher).map_err(read_error)?;
    }

    trace!(path = %relative.display(), "hashed");
    Ok(FileDigest {
        path: relative,
        hash: hasher.finalize(),
    })
}

/// Checksum every path matched by `patterns`, relative to `root`
///
/// Every pattern must match at least one path. The result does not depend on
/// the order in which the filesystem returns matches.
pub fn checksum(root: &Path, patterns: &[String]) -> CacheResult<String> {
    let workers = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);

    let pipeline = Pipeline {
        root,
        cancelled: AtomicBool::new(false),
        failure: Mutex::new(None),
    };

    let (job_tx, job_rx) = mpsc::sync_channel::<PathBuf>(workers * 2);
    let (result_tx, result_rx) = mpsc::sync_channel::<FileDigest>(workers * 2);
    let job_rx = Arc::new(Mutex::new(job_rx));
    let pipeline_ref = &pipeline;

    let mut digests: Vec<FileDigest> = thread::scope(|s| {
        s.spawn(move || pipeline_ref.produce(patterns, job_tx));

        for _ in 0..workers {
            let jobs = Arc::clone(&job_rx);
            let results = result_tx.clone();
            s.spawn(move || pipeline_ref.work(jobs, results));
        }

        // The channels close once the producer and every worker are done.
        drop(job_rx);
        drop(result_tx);

        result_rx.iter().collect()
    });

    let failure = pipeline
        .failure
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(error) = failure {
        return Err(error);
    }

    digests.sort_by(|a, b| a.path.cmp(&b.path));

    let mut combined = Hasher::new();
    for digest in &digests {
        combined.update(digest.path.to_string_lossy().as_bytes());
        combined.update(&[0]);
        combined.update(digest.hash.as_bytes());
    }

    debug!(files = digests.len(), "computed checksum");
    Ok(STANDARD.encode(combined.finalize().as_bytes()))
}
