//! Syntax backend seam.
//!
//! The document core never looks inside a parser. It asks a registry for the
//! backend matching a buffer's language, lets the backend parse the full
//! text once, and afterwards only queries "what node kind covers this point".
//! The returned `SyntaxTree` is an owned resource: whoever holds it must call
//! `release` exactly once (the Moment does so from its `Drop`).
//!
//! Absence is not an error: an unknown language or a language without a
//! registered backend resolves to `None`.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub mod treesitter;

pub use treesitter::TreeSitterRust;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    Rust,
    #[default]
    Unknown,
}

impl Language {
    /// Detect from the file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("rs") => Language::Rust,
            _ => Language::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Language::Unknown)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Rust => f.write_str("rust"),
            Language::Unknown => f.write_str("unknown"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SyntaxError {
    #[error("backend rejected language {language}: {reason}")]
    LanguageRejected { language: Language, reason: String },
    #[error("parser produced no tree for {0}")]
    ParseFailed(Language),
    #[error("syntax tree already released")]
    AlreadyReleased,
}

/// Parsed syntax resource owned by exactly one document snapshot.
pub trait SyntaxTree: Send + Sync {
    /// Kind of the smallest node covering `(row, byte_column)`.
    fn node_kind_at(&self, row: usize, byte_column: usize) -> Option<String>;

    /// Free the underlying resource. Must be called exactly once; a second
    /// call reports `SyntaxError::AlreadyReleased`.
    fn release(&mut self) -> Result<(), SyntaxError>;
}

/// Factory producing syntax trees for one language.
pub trait SyntaxBackend: Send + Sync {
    fn language(&self) -> Language;
    fn parse(&self, source: &str) -> Result<Box<dyn SyntaxTree>, SyntaxError>;
}

/// Registration list of backends keyed by language.
#[derive(Clone, Default)]
pub struct SyntaxRegistry {
    backends: Vec<Arc<dyn SyntaxBackend>>,
}

impl fmt::Debug for SyntaxRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.backends.iter().map(|b| b.language()))
            .finish()
    }
}

impl SyntaxRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in backend.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TreeSitterRust));
        registry
    }

    /// Later registrations for the same language take precedence.
    pub fn register(&mut self, backend: Arc<dyn SyntaxBackend>) {
        self.backends.push(backend);
    }

    pub fn resolve(&self, language: Language) -> Option<Arc<dyn SyntaxBackend>> {
        if !language.is_known() {
            return None;
        }
        self.backends
            .iter()
            .rev()
            .find(|b| b.language() == language)
            .cloned()
    }
}
