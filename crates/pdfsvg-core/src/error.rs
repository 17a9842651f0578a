//! Error and warning types for pdfsvg-rs.
//!
//! Provides [`PdfError`] for fatal errors that stop processing a document
//! or page, [`InvariantViolation`] for builder contract violations,
//! [`ImportWarning`] for non-fatal issues that allow best-effort
//! continuation, [`ImportResult`] for pairing a value with collected
//! warnings, and [`ImportOptions`] for configuring one import session.

use std::fmt;

use crate::font::FontStrategy;
use crate::page::CropBox;

/// Reason a document could not be opened.
///
/// Mirrors the failure codes reported by the PDF backend so that callers
/// can decide whether to prompt for a password or give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OpenFailureReason {
    /// The document is encrypted.
    Encrypted,
    /// The file could not be opened or is not a PDF.
    OpenFile,
    /// The document catalog is missing or malformed.
    BadCatalog,
    /// The document is damaged beyond repair.
    Damaged,
    /// The requested page does not exist.
    BadPageNumber,
    /// Reading the file failed.
    FileIo,
    /// Anything else.
    Other,
}

impl OpenFailureReason {
    /// Returns the string tag for this reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpenFailureReason::Encrypted => "encrypted",
            OpenFailureReason::OpenFile => "open-failed",
            OpenFailureReason::BadCatalog => "bad-catalog",
            OpenFailureReason::Damaged => "damaged",
            OpenFailureReason::BadPageNumber => "bad-page-number",
            OpenFailureReason::FileIo => "file-io",
            OpenFailureReason::Other => "other",
        }
    }
}

impl fmt::Display for OpenFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A broken builder contract.
///
/// These never happen for well-behaved callers. They abort the current
/// page, never the whole import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantViolation {
    /// `restore` was called without a matching `save`.
    ClipStackUnderflow,
    /// A clip was set twice on a frame that was not a fresh copy.
    InvalidClipStateTransition,
    /// A container was popped that was never pushed.
    ContainerStackUnderflow,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::ClipStackUnderflow => {
                write!(f, "clip history restored more often than saved")
            }
            InvariantViolation::InvalidClipStateTransition => {
                write!(f, "clip path is already set on this frame")
            }
            InvariantViolation::ContainerStackUnderflow => {
                write!(f, "container stack popped past the page root")
            }
        }
    }
}

impl std::error::Error for InvariantViolation {}

/// Fatal error types for PDF import.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfError {
    /// Error parsing PDF structure or syntax.
    ParseError(String),
    /// I/O error reading PDF data.
    IoError(String),
    /// Error resolving font or encoding information.
    FontError(String),
    /// Error during content stream interpretation.
    InterpreterError(String),
    /// A configured resource limit was exceeded.
    ResourceLimitExceeded {
        /// Name of the limit that was exceeded (e.g., "max_recursion_depth").
        limit_name: String,
        /// The configured limit value.
        limit_value: usize,
        /// The actual value that exceeded the limit.
        actual_value: usize,
    },
    /// The document could not be opened.
    OpenFailed(OpenFailureReason),
    /// The builder's internal contract was violated.
    Invariant(InvariantViolation),
    /// Any other error not covered by specific variants.
    Other(String),
}

impl PdfError {
    /// The open failure reason, when this error came from opening a document.
    pub fn open_failure(&self) -> Option<OpenFailureReason> {
        match self {
            PdfError::OpenFailed(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl fmt::Display for PdfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PdfError::ParseError(msg) => write!(f, "parse error: {msg}"),
            PdfError::IoError(msg) => write!(f, "I/O error: {msg}"),
            PdfError::FontError(msg) => write!(f, "font error: {msg}"),
            PdfError::InterpreterError(msg) => write!(f, "interpreter error: {msg}"),
            PdfError::ResourceLimitExceeded {
                limit_name,
                limit_value,
                actual_value,
            } => write!(
                f,
                "resource limit exceeded: {limit_name} (limit: {limit_value}, actual: {actual_value})"
            ),
            PdfError::OpenFailed(reason) => write!(f, "failed to open PDF: {reason}"),
            PdfError::Invariant(violation) => write!(f, "invariant violation: {violation}"),
            PdfError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for PdfError {}

impl From<std::io::Error> for PdfError {
    fn from(err: std::io::Error) -> Self {
        PdfError::IoError(err.to_string())
    }
}

impl From<InvariantViolation> for PdfError {
    fn from(violation: InvariantViolation) -> Self {
        PdfError::Invariant(violation)
    }
}

/// Machine-readable warning code for categorizing import issues.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "type", content = "detail")
)]
pub enum ImportWarningCode {
    /// A referenced font was not found in page resources.
    MissingFont,
    /// An unsupported content stream operator was encountered.
    UnsupportedOperator,
    /// A PDF object is malformed or has unexpected structure.
    MalformedObject,
    /// A shading, function, or pattern type cannot be converted.
    UnsupportedShading,
    /// An image could not be decoded.
    ImageDecode,
    /// A configured resource limit was reached during import.
    ResourceLimitReached,
    /// The graphics state stack was unbalanced.
    UnbalancedState,
    /// Any other warning not covered by specific variants.
    Other(String),
}

impl ImportWarningCode {
    /// Returns the string tag for this warning code.
    pub fn as_str(&self) -> &str {
        match self {
            ImportWarningCode::MissingFont => "MISSING_FONT",
            ImportWarningCode::UnsupportedOperator => "UNSUPPORTED_OPERATOR",
            ImportWarningCode::MalformedObject => "MALFORMED_OBJECT",
            ImportWarningCode::UnsupportedShading => "UNSUPPORTED_SHADING",
            ImportWarningCode::ImageDecode => "IMAGE_DECODE",
            ImportWarningCode::ResourceLimitReached => "RESOURCE_LIMIT_REACHED",
            ImportWarningCode::UnbalancedState => "UNBALANCED_STATE",
            ImportWarningCode::Other(_) => "OTHER",
        }
    }
}

impl fmt::Display for ImportWarningCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal warning encountered during import.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImportWarning {
    /// Machine-readable warning code.
    pub code: ImportWarningCode,
    /// Human-readable description of the warning.
    pub description: String,
    /// Page number where the warning occurred (0-indexed), if applicable.
    pub page: Option<usize>,
    /// Content stream operator that triggered the warning.
    pub operator: Option<String>,
}

impl ImportWarning {
    /// Create a warning with just a description.
    ///
    /// Uses [`ImportWarningCode::Other`] as the default code.
    pub fn new(description: impl Into<String>) -> Self {
        let desc = description.into();
        Self {
            code: ImportWarningCode::Other(desc.clone()),
            description: desc,
            page: None,
            operator: None,
        }
    }

    /// Create a warning with a specific code and description.
    pub fn with_code(code: ImportWarningCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
            page: None,
            operator: None,
        }
    }

    /// Attach the page index.
    pub fn on_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    /// Attach the operator name.
    pub fn at_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }
}

impl fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.description)?;
        if let Some(page) = self.page {
            write!(f, " (page {page})")?;
        }
        if let Some(ref op) = self.operator {
            write!(f, " [operator {op}]")?;
        }
        Ok(())
    }
}

/// Result wrapper that pairs a value with collected warnings.
#[derive(Debug, Clone)]
pub struct ImportResult<T> {
    /// The imported value.
    pub value: T,
    /// Warnings collected during import.
    pub warnings: Vec<ImportWarning>,
}

impl<T> ImportResult<T> {
    /// Create a result with no warnings.
    pub fn ok(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    /// Create a result with warnings.
    pub fn with_warnings(value: T, warnings: Vec<ImportWarning>) -> Self {
        Self { value, warnings }
    }

    /// Returns true if there are no warnings.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Transform the value while preserving warnings.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ImportResult<U> {
        ImportResult {
            value: f(self.value),
            warnings: self.warnings,
        }
    }
}

/// Options controlling one import session.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Approximation precision for gradients and meshes (default: 2.0).
    ///
    /// Higher values give finer tessellation. See [`ImportOptions::color_delta`].
    pub precision: f64,
    /// Page box to crop to (default: None, the media box without a crop clip).
    pub crop: Option<CropBox>,
    /// Uniform font fallback policy (default: render missing fonts as shapes).
    pub font_strategy: FontStrategy,
    /// Maximum nesting of form XObjects and patterns (default: 12).
    pub max_recursion_depth: usize,
    /// Maximum nesting of resource dictionaries walked for fonts (default: 32).
    pub max_resource_depth: usize,
    /// Whether image data is embedded (default: true). Without it images
    /// are emitted as empty placeholders of the right geometry.
    pub embed_images: bool,
    /// Whether to collect warnings during import (default: true).
    pub collect_warnings: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            precision: 2.0,
            crop: None,
            font_strategy: FontStrategy::RenderMissing,
            max_recursion_depth: 12,
            max_resource_depth: 32,
            embed_images: true,
            collect_warnings: true,
        }
    }
}

impl ImportOptions {
    /// Color difference below which gradients and meshes stop subdividing.
    pub fn color_delta(&self) -> f64 {
        color_delta_for_precision(self.precision)
    }
}

/// Maps a user-facing precision value onto a color subdivision step.
///
/// Non-positive values fall back to a step of 0.5.
pub fn color_delta_for_precision(precision: f64) -> f64 {
    if precision > 0.0 { 1.0 / precision } else { 0.5 }
}
