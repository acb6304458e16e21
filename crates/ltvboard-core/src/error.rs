//! Error types for ltvboard-core
//!
//! Hard failures (I/O, store, configuration) are `CoreError`s. Record-level
//! problems never fail an import: they are counted in a [`LoadReport`] so the
//! caller can still render whatever was admitted.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for ltvboard operations
#[derive(Error, Debug)]
pub enum CoreError {
    // ===================
    // IO Errors
    // ===================
    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    // ===================
    // Parse Errors
    // ===================
    #[error("Failed to parse CSV in {path}: {message}")]
    CsvParse {
        path: PathBuf,
        message: String,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to parse config {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    // ===================
    // Store Errors
    // ===================
    #[error("Order store error: {message}")]
    Store {
        message: String,
        #[source]
        source: rusqlite::Error,
    },

    // ===================
    // Input Errors
    // ===================
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl CoreError {
    pub(crate) fn store(message: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Store {
            message: message.into(),
            source,
        }
    }
}

/// Severity level for errors during load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Non-critical, can continue with degraded functionality
    Warning,
    /// Significant but not fatal
    Error,
    /// Cannot continue
    Fatal,
}

/// Individual error entry in load report
#[derive(Debug, Clone)]
pub struct LoadError {
    pub source: String,
    pub message: String,
    pub severity: ErrorSeverity,
    /// Actionable suggestion for user (optional)
    pub suggestion: Option<String>,
}

impl LoadError {
    pub fn warning(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            severity: ErrorSeverity::Warning,
            suggestion: None,
        }
    }

    pub fn error(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            severity: ErrorSeverity::Error,
            suggestion: None,
        }
    }

    pub fn fatal(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            severity: ErrorSeverity::Fatal,
            suggestion: None,
        }
    }

    /// Add an actionable suggestion to this error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Create user-friendly error from CoreError with context-aware suggestions
    pub fn from_core_error(source: impl Into<String>, error: &CoreError) -> Self {
        let source = source.into();
        let (message, suggestion) = match error {
            CoreError::FileNotFound { path } => (
                format!("File not found: {}", path.display()),
                Some(format!("Check if file exists: ls {}", path.display())),
            ),
            CoreError::FileRead { path, .. } => (
                format!("Cannot read file: {}", path.display()),
                Some(format!("Check permissions: chmod +r {}", path.display())),
            ),
            CoreError::CsvParse { path, message, .. } => (
                format!("Invalid CSV in {}: {}", path.display(), message),
                Some("Export the orders again as UTF-8 CSV with a header row".to_string()),
            ),
            CoreError::Store { message, .. } => (
                format!("Order store failure: {}", message),
                Some("Run 'ltvboard reset --yes' to rebuild the store".to_string()),
            ),
            _ => (error.to_string(), None),
        };

        Self {
            source,
            message,
            severity: ErrorSeverity::Error,
            suggestion,
        }
    }
}

/// Report of what happened while ingesting or loading records
///
/// Malformed rows are dropped silently from the analytics point of view,
/// but the counts land here so the caller can tell "no data" apart from
/// "nothing parsable".
#[derive(Debug, Default)]
pub struct LoadReport {
    pub errors: Vec<LoadError>,
    /// Raw rows read from the input
    pub rows_read: usize,
    /// Rows admitted as canonical records or line items
    pub records_admitted: usize,
    /// Rows rejected for a missing date or a non-positive/unparsable amount
    pub records_dropped: usize,
    /// Admitted rows whose customer identity had to be synthesized
    pub identities_synthesized: usize,
    /// Rows not admitted because the store ceiling was reached
    pub records_over_limit: usize,
    /// True once persisted collections were read back
    pub store_loaded: bool,
}

impl LoadReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: LoadError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.errors.push(LoadError::warning(source, message));
    }

    /// Returns true if there are any fatal errors
    pub fn has_fatal_errors(&self) -> bool {
        self.errors
            .iter()
            .any(|e| e.severity == ErrorSeverity::Fatal)
    }

    /// Returns true if there are any errors (including warnings)
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns only warnings
    pub fn warnings(&self) -> impl Iterator<Item = &LoadError> {
        self.errors
            .iter()
            .filter(|e| e.severity == ErrorSeverity::Warning)
    }

    /// Returns count by severity
    pub fn error_count(&self) -> (usize, usize, usize) {
        let count = |severity| self.errors.iter().filter(|e| e.severity == severity).count();
        (
            count(ErrorSeverity::Warning),
            count(ErrorSeverity::Error),
            count(ErrorSeverity::Fatal),
        )
    }

    /// Merge another report into this one
    pub fn merge(&mut self, other: LoadReport) {
        self.errors.extend(other.errors);
        self.rows_read += other.rows_read;
        self.records_admitted += other.records_admitted;
        self.records_dropped += other.records_dropped;
        self.identities_synthesized += other.identities_synthesized;
        self.records_over_limit += other.records_over_limit;
        self.store_loaded = self.store_loaded || other.store_loaded;
    }
}
