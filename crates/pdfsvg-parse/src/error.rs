//! Error types for the parsing and interpreter layers.
//!
//! [`BackendError`] wraps lopdf and content-stream failures and converts
//! into [`PdfError`] at the crate boundary.

use pdfsvg_core::{OpenFailureReason, PdfError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    /// lopdf rejected the file or an object could not be resolved.
    #[error("PDF parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A font program, CMap or encoding was unreadable.
    #[error("font error: {0}")]
    Font(String),

    /// A content stream could not be tokenized or executed.
    #[error("interpreter error: {0}")]
    Interpreter(String),

    #[error("cannot open document: {0}")]
    Open(OpenFailureReason),

    /// Raised by the SVG builder while a page was being imported.
    #[error(transparent)]
    Core(#[from] PdfError),
}

impl From<lopdf::Error> for BackendError {
    fn from(err: lopdf::Error) -> Self {
        BackendError::Parse(err.to_string())
    }
}

impl From<BackendError> for PdfError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Parse(msg) => PdfError::ParseError(msg),
            BackendError::Io(e) => PdfError::IoError(e.to_string()),
            BackendError::Font(msg) => PdfError::FontError(msg),
            BackendError::Interpreter(msg) => PdfError::InterpreterError(msg),
            BackendError::Open(reason) => PdfError::OpenFailed(reason),
            BackendError::Core(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_message_is_prefixed() {
        let err = BackendError::Parse("no trailer".to_string());
        assert_eq!(err.to_string(), "PDF parse error: no trailer");
    }

    #[test]
    fn io_errors_convert_and_keep_their_text() {
        let err = BackendError::from(std::io::Error::other("disk gone"));
        assert!(matches!(err, BackendError::Io(_)));
        assert_eq!(PdfError::from(err), PdfError::IoError("disk gone".into()));
    }

    #[test]
    fn open_reason_survives_conversion() {
        let pdf_err: PdfError = BackendError::Open(OpenFailureReason::Encrypted).into();
        assert_eq!(pdf_err.open_failure(), Some(OpenFailureReason::Encrypted));
        assert_eq!(pdf_err.to_string(), "failed to open PDF: encrypted");
    }

    #[test]
    fn core_errors_pass_through() {
        let original = PdfError::ResourceLimitExceeded {
            limit_name: "max_recursion_depth".to_string(),
            limit_value: 12,
            actual_value: 13,
        };
        let pdf_err: PdfError = BackendError::Core(original.clone()).into();
        assert_eq!(pdf_err, original);
    }

    #[test]
    fn interpreter_error_maps_to_interpreter_variant() {
        let pdf_err: PdfError = BackendError::Interpreter("stack underflow".to_string()).into();
        assert_eq!(pdf_err, PdfError::InterpreterError("stack underflow".to_string()));
    }
}
