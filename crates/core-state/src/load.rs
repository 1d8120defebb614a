//! Building Moments from bytes, files and directories.

use crate::moment::Moment;
use core_syntax::{Language, SyntaxRegistry};
use core_text::{LayoutEnv, Line, Linebreak, split_lines};
use core_workers::WorkerPool;
use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to stat {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0} is not a regular file or directory")]
    NotAFile(PathBuf),
}

/// On-disk fingerprint captured when a file is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
    pub len: u64,
}

impl FileInfo {
    pub fn stat(path: &Path) -> Result<Self, LoadError> {
        Ok(Self::from_metadata(path, &metadata(path)?))
    }

    fn from_metadata(path: &Path, meta: &fs::Metadata) -> Self {
        Self {
            path: path.to_path_buf(),
            modified: meta.modified().ok(),
            len: meta.len(),
        }
    }

    /// Whether the file was modified, resized or removed since this
    /// fingerprint was taken.
    pub fn changed_on_disk(&self) -> bool {
        match Self::stat(&self.path) {
            Ok(now) => now != *self,
            Err(_) => true,
        }
    }
}

/// A freshly constructed Moment plus the line-break policy for saving it.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub moment: Arc<Moment>,
    pub linebreak: Linebreak,
}

/// Shared context for Moment construction.
#[derive(Clone)]
pub struct Loader {
    env: Arc<LayoutEnv>,
    syntax: Arc<SyntaxRegistry>,
    pool: Option<Arc<WorkerPool>>,
}

impl Loader {
    pub fn new(env: Arc<LayoutEnv>) -> Self {
        Self {
            env,
            syntax: Arc::new(SyntaxRegistry::new()),
            pool: None,
        }
    }

    pub fn with_syntax(mut self, syntax: Arc<SyntaxRegistry>) -> Self {
        self.syntax = syntax;
        self
    }

    /// Hand every new Moment's lines to `pool` for background layout.
    pub fn with_pool(mut self, pool: Arc<WorkerPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn env(&self) -> &Arc<LayoutEnv> {
        &self.env
    }

    /// Split `bytes` into lines and wrap them in a new Moment. Invalid UTF-8
    /// sequences are replaced with U+FFFD.
    pub fn from_bytes(&self, bytes: &[u8]) -> Loaded {
        let (moment, linebreak) = self.build(bytes, Language::Unknown);
        Loaded {
            moment: Arc::new(moment),
            linebreak,
        }
    }

    pub fn from_file(&self, path: &Path) -> Result<Loaded, LoadError> {
        let meta = metadata(path)?;
        if !meta.is_file() {
            return Err(LoadError::NotAFile(path.to_path_buf()));
        }
        let info = FileInfo::from_metadata(path, &meta);
        let bytes = fs::read(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let (moment, linebreak) = self.build(&bytes, Language::from_path(path));
        let moment = Arc::new(moment.with_file_info(info));
        info!(
            target: "state.load",
            path = %path.display(),
            lines = moment.num_lines(),
            linebreak = ?linebreak,
            "file_loaded"
        );
        Ok(Loaded { moment, linebreak })
    }

    /// A single file, or every regular file directly inside a directory.
    /// Directory entries that fail to load are skipped and logged.
    pub fn from_path(&self, path: &Path) -> Result<Vec<Loaded>, LoadError> {
        let meta = metadata(path)?;
        if meta.is_file() {
            return Ok(vec![self.from_file(path)?]);
        }
        if !meta.is_dir() {
            return Err(LoadError::NotAFile(path.to_path_buf()));
        }
        let entries = fs::read_dir(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| !t.is_dir()).unwrap_or(false))
            .map(|e| e.path())
            .collect();
        files.sort();
        let mut loaded = Vec::with_capacity(files.len());
        for file in files {
            match self.from_file(&file) {
                Ok(l) => loaded.push(l),
                Err(err) => {
                    warn!(target: "state.load", path = %file.display(), error = %err, "entry_skipped");
                }
            }
        }
        Ok(loaded)
    }

    fn build(&self, bytes: &[u8], language: Language) -> (Moment, Linebreak) {
        let text = String::from_utf8_lossy(bytes);
        if let Cow::Owned(_) = text {
            debug!(target: "state.load", size_bytes = bytes.len(), "invalid_utf8_replaced");
        }
        let split = split_lines(&text);
        let lines: Vec<Arc<Line>> = split
            .lines
            .into_iter()
            .map(|content| Arc::new(Line::new(content, self.env.clone())))
            .collect();
        if let Some(pool) = &self.pool {
            pool.submit_lines(lines.clone());
        }
        debug!(
            target: "state.load",
            lines = lines.len(),
            cr_stripped = split.cr_stripped,
            linebreak = ?split.linebreak,
            "lines_split"
        );
        let moment = Moment::new(None, lines).with_syntax(language, self.syntax.clone());
        (moment, split.linebreak)
    }
}

fn metadata(path: &Path) -> Result<fs::Metadata, LoadError> {
    fs::metadata(path).map_err(|source| LoadError::Metadata {
        path: path.to_path_buf(),
        source,
    })
}
