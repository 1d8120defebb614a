//! Configuration loading and parsing.
//!
//! Parses `quire.toml` (or an override path provided by the binary). Three
//! tables are recognized:
//!
//! ```toml
//! [layout]
//! tab_width = 4
//! expand_tabs = true
//!
//! [workers]
//! threads = 0      # 0 = available parallelism
//! line_queue = 512
//! row_queue = 0    # 0 = threads * 8
//!
//! [hints]
//! initial_generation = 42
//! ```
//!
//! Raw values are kept as parsed; the clamped / resolved views are produced
//! by `Config::layout` and `Config::workers` so a later change of hardware
//! parallelism or an override from the command line can re-resolve them.
//! Unknown fields are ignored (TOML deserialization tolerance) and a file that
//! fails to parse falls back to defaults.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

/// Smallest / largest accepted tab stop.
pub const TAB_WIDTH_MIN: u16 = 1;
pub const TAB_WIDTH_MAX: u16 = 16;

#[derive(Debug, Deserialize, Clone)]
pub struct LayoutSection {
    #[serde(default = "LayoutSection::default_tab_width")]
    pub tab_width: u16,
    #[serde(default = "LayoutSection::default_expand_tabs")]
    pub expand_tabs: bool,
}

impl Default for LayoutSection {
    fn default() -> Self {
        Self {
            tab_width: Self::default_tab_width(),
            expand_tabs: Self::default_expand_tabs(),
        }
    }
}

impl LayoutSection {
    const fn default_tab_width() -> u16 {
        4
    }
    const fn default_expand_tabs() -> bool {
        true
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkersSection {
    #[serde(default)]
    pub threads: usize,
    #[serde(default = "WorkersSection::default_line_queue")]
    pub line_queue: usize,
    #[serde(default)]
    pub row_queue: usize,
}

impl Default for WorkersSection {
    fn default() -> Self {
        Self {
            threads: 0,
            line_queue: Self::default_line_queue(),
            row_queue: 0,
        }
    }
}

impl WorkersSection {
    const fn default_line_queue() -> usize {
        512
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HintsSection {
    #[serde(default = "HintsSection::default_initial_generation")]
    pub initial_generation: u64,
}

impl Default for HintsSection {
    fn default() -> Self {
        Self {
            initial_generation: Self::default_initial_generation(),
        }
    }
}

impl HintsSection {
    const fn default_initial_generation() -> u64 {
        42
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub layout: LayoutSection,
    #[serde(default)]
    pub workers: WorkersSection,
    #[serde(default)]
    pub hints: HintsSection,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
}

/// Resolved line layout parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConfig {
    pub tab_width: usize,
    pub expand_tabs: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            tab_width: LayoutSection::default_tab_width() as usize,
            expand_tabs: LayoutSection::default_expand_tabs(),
        }
    }
}

/// Resolved worker pool sizing. `threads` is always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    pub threads: usize,
    pub line_queue: usize,
    pub row_queue: usize,
}

impl WorkerConfig {
    /// Sizing derived from the machine's available parallelism.
    pub fn from_parallelism() -> Self {
        Self::resolve(&WorkersSection::default())
    }

    fn resolve(section: &WorkersSection) -> Self {
        let threads = if section.threads == 0 {
            available_parallelism()
        } else {
            section.threads
        };
        let row_queue = if section.row_queue == 0 {
            threads * 8
        } else {
            section.row_queue
        };
        Self {
            threads,
            line_queue: section.line_queue.max(1),
            row_queue,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from_parallelism()
    }
}

fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from("quire.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("quire").join("quire.toml");
    }
    PathBuf::from("quire.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => Ok(Config {
                raw: Some(content),
                file,
            }),
            Err(e) => {
                warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed");
                Ok(Config::default())
            }
        }
    } else {
        Ok(Config::default())
    }
}

impl Config {
    /// Layout parameters with the tab stop clamped to `TAB_WIDTH_MIN..=TAB_WIDTH_MAX`.
    pub fn layout(&self) -> LayoutConfig {
        let raw = self.file.layout.tab_width;
        let clamped = raw.clamp(TAB_WIDTH_MIN, TAB_WIDTH_MAX);
        if clamped != raw {
            info!(
                target: "config",
                raw,
                clamped,
                min = TAB_WIDTH_MIN,
                max = TAB_WIDTH_MAX,
                "tab_width_clamped"
            );
        }
        LayoutConfig {
            tab_width: clamped as usize,
            expand_tabs: self.file.layout.expand_tabs,
        }
    }

    pub fn workers(&self) -> WorkerConfig {
        WorkerConfig::resolve(&self.file.workers)
    }

    pub fn initial_generation(&self) -> u64 {
        self.file.hints.initial_generation
    }

    /// Override the tab stop (e.g. from a command line flag). The value is
    /// clamped when `layout()` is next resolved.
    pub fn set_tab_width(&mut self, tab_width: u16) {
        self.file.layout.tab_width = tab_width;
    }
}
